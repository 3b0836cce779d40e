//! Applying parsed change documents to a project tree.
//!
//! Walks the document in order and, per operation: validate the target
//! path, create missing parent directories, write atomically. Failures
//! are contained per file so one bad entry never aborts the batch; the
//! result itemizes every outcome in document order.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::core::markup::{ChangeOperation, ParsedDocument};
use crate::infra::io::write_atomic;
use crate::infra::paths::resolve_under;

/// Per-file failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Validation rejected the target path; nothing touched the disk.
    PathTraversal,
    /// Directory creation or the write itself failed.
    Io,
}

/// One failed entry from an apply batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub path: Utf8PathBuf,
    pub kind: ErrorKind,
    /// Human-readable cause, e.g. the OS error string.
    pub detail: String,
}

/// Outcome of one apply call. Both lists are in document order and the
/// value is built once per invocation; nothing mutates it afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub applied: Vec<Utf8PathBuf>,
    pub failed: Vec<Failure>,
}

impl ApplyResult {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Apply every operation in `document` under `base_dir`.
///
/// Operations run sequentially in document order, which makes duplicate
/// targets land last-writer-wins and keeps the reported order
/// reproducible. Per-file problems go into `ApplyResult.failed`; the
/// only outer error is a base directory that does not exist or is not
/// a directory. There is no cross-file transaction and no rollback:
/// the caller gets a complete itemized report instead.
#[instrument(skip(document), fields(ops = document.len()))]
pub fn apply(base_dir: &Path, document: &ParsedDocument) -> Result<ApplyResult> {
    let base = dunce::canonicalize(base_dir)
        .with_context(|| format!("unusable base directory: {}", base_dir.display()))?;
    if !base.is_dir() {
        bail!("base directory is not a directory: {}", base.display());
    }

    let mut result = ApplyResult::default();
    for op in &document.operations {
        match apply_one(&base, op) {
            Ok(()) => {
                debug!(path = %op.path(), "applied");
                result.applied.push(op.path().to_owned());
            }
            Err((kind, detail)) => {
                warn!(path = %op.path(), ?kind, detail, "operation failed");
                result.failed.push(Failure {
                    path: op.path().to_owned(),
                    kind,
                    detail,
                });
            }
        }
    }

    debug!(
        applied = result.applied.len(),
        failed = result.failed.len(),
        "batch complete"
    );
    Ok(result)
}

/// Execute a single operation: validate, prepare directories, write.
/// Validation comes first and is purely lexical, so a rejected path
/// causes no filesystem activity at all.
fn apply_one(base: &Path, op: &ChangeOperation) -> std::result::Result<(), (ErrorKind, String)> {
    let target =
        resolve_under(base, op.path()).map_err(|e| (ErrorKind::PathTraversal, e.to_string()))?;

    match op {
        ChangeOperation::Replace { content, .. } => {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| (ErrorKind::Io, e.to_string()))?;
            }
            write_atomic(&target, content.as_bytes())
                .map_err(|e| (ErrorKind::Io, e.to_string()))?;
        }
    }
    Ok(())
}
