//! Lexical validation of markup-supplied relative paths.
//!
//! The applier's trust boundary: a path that survives [`normalize_rel`]
//! is joined to the project root and used as-is. Validation is purely
//! lexical so a rejected path causes zero filesystem activity; symlinks
//! inside the root are deliberately not resolved.

use anyhow::{Result, bail};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::path::{Path, PathBuf};

/// Normalize a markup-supplied path into a clean project-relative path.
///
/// Rejects empty paths, absolute paths (including root-relative forms
/// like `/etc/passwd` and Windows drive prefixes), `..` segments that
/// climb above the root, and paths that normalize to the root itself.
/// `.` segments and non-escaping `..` are folded away, so `a/../b`
/// passes as `b` while `a/../../b` is rejected.
pub fn normalize_rel(p: &Utf8Path) -> Result<Utf8PathBuf> {
    if p.as_str().is_empty() {
        bail!("empty path");
    }
    if p.is_absolute() {
        bail!("path must be relative to the project root: {p}");
    }

    let mut out = Utf8PathBuf::new();
    for c in p.components() {
        match c {
            Utf8Component::ParentDir => {
                if !out.pop() {
                    bail!("path escapes the project root: {p}");
                }
            }
            Utf8Component::CurDir => {}
            Utf8Component::Prefix(_) | Utf8Component::RootDir => {
                bail!("path must be relative to the project root: {p}");
            }
            Utf8Component::Normal(seg) => out.push(seg),
        }
    }

    if out.as_str().is_empty() {
        bail!("path resolves to the project root itself: {p}");
    }
    Ok(out)
}

/// Validate `rel` and join it under `base`, yielding the absolute target.
pub fn resolve_under(base: &Path, rel: &Utf8Path) -> Result<PathBuf> {
    let clean = normalize_rel(rel)?;
    Ok(base.join(clean.as_std_path()))
}
