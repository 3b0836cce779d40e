//! Read-only preview of what an apply batch would do.
//!
//! Classifies every target against the current tree (create, overwrite,
//! unchanged, rejected) without writing anything, and can render a
//! unified diff per file. Duplicate targets are coalesced last-wins
//! because that is the state the tree would end up in; the apply step
//! itself still executes every operation.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use similar::TextDiff;
use tracing::{debug, instrument};

use crate::core::markup::{ChangeOperation, ParsedDocument};
use crate::infra::paths::resolve_under;

/// What applying one operation would do to the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status", content = "reason")]
pub enum EntryStatus {
    /// Target does not exist yet.
    Create,
    /// Target exists with different content.
    Overwrite,
    /// Target already has exactly this content.
    Unchanged,
    /// Path validation would reject this target before any write.
    Rejected(String),
}

/// One previewed target, in document order (duplicates collapsed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewEntry {
    pub path: Utf8PathBuf,
    #[serde(flatten)]
    pub status: EntryStatus,
    /// Unified diff against the current file, when requested and applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Full preview of a parsed document against a base directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub entries: Vec<PreviewEntry>,
    pub creates: usize,
    pub overwrites: usize,
    pub unchanged: usize,
    pub rejected: usize,
    /// Raw operation count before duplicate targets were collapsed.
    pub operations: usize,
}

/// Build a preview of `document` against `base_dir`. Purely read-only.
///
/// Classification reads each target at most once; diffs are computed in
/// parallel and collected back into document order.
#[instrument(skip(document), fields(ops = document.len()))]
pub fn build(base_dir: &Path, document: &ParsedDocument, with_diff: bool) -> Result<Preview> {
    let base = dunce::canonicalize(base_dir)
        .with_context(|| format!("unusable base directory: {}", base_dir.display()))?;
    if !base.is_dir() {
        bail!("base directory is not a directory: {}", base.display());
    }

    // Last-wins per target: a later block for the same path is the one
    // that determines the final tree state.
    let mut latest: IndexMap<&Utf8Path, &ChangeOperation> = IndexMap::new();
    for op in &document.operations {
        latest.insert(op.path(), op);
    }
    let targets: Vec<&ChangeOperation> = latest.into_values().collect();

    let entries: Vec<PreviewEntry> = targets
        .par_iter()
        .map(|op| classify(&base, op, with_diff))
        .collect();

    let mut preview = Preview {
        operations: document.len(),
        ..Preview::default()
    };
    for entry in &entries {
        match entry.status {
            EntryStatus::Create => preview.creates += 1,
            EntryStatus::Overwrite => preview.overwrites += 1,
            EntryStatus::Unchanged => preview.unchanged += 1,
            EntryStatus::Rejected(_) => preview.rejected += 1,
        }
    }
    preview.entries = entries;

    debug!(
        creates = preview.creates,
        overwrites = preview.overwrites,
        unchanged = preview.unchanged,
        rejected = preview.rejected,
        "preview built"
    );
    Ok(preview)
}

fn classify(base: &Path, op: &ChangeOperation, with_diff: bool) -> PreviewEntry {
    let target = match resolve_under(base, op.path()) {
        Ok(target) => target,
        Err(e) => {
            return PreviewEntry {
                path: op.path().to_owned(),
                status: EntryStatus::Rejected(e.to_string()),
                diff: None,
            };
        }
    };

    let ChangeOperation::Replace { content: new, .. } = op;
    let (status, old) = match fs::read_to_string(&target) {
        Ok(old) if old == *new => (EntryStatus::Unchanged, Some(old)),
        Ok(old) => (EntryStatus::Overwrite, Some(old)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => (EntryStatus::Create, None),
        // Unreadable (binary, permissions): still an overwrite, no diff.
        Err(_) => (EntryStatus::Overwrite, None),
    };

    let diff = if !with_diff {
        None
    } else {
        match &status {
            EntryStatus::Create => Some(unified_diff(op.path(), "", new)),
            EntryStatus::Overwrite => old.as_deref().map(|old| unified_diff(op.path(), old, new)),
            _ => None,
        }
    };

    PreviewEntry {
        path: op.path().to_owned(),
        status,
        diff,
    }
}

fn unified_diff(path: &Utf8Path, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}
