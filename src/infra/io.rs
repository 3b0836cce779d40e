//! Atomic file-write plumbing.
//!
//! A replace lands as: temp file beside the destination, full write,
//! fsync, rename over the target, parent directory fsync. A crash or
//! error at any point leaves the previous file (or its absence) intact.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Write `data` to `path` atomically.
///
/// The temp file must live in the destination directory: a rename only
/// replaces atomically within one filesystem, so there is no fallback
/// to the OS temp dir and no copy fallback on a failed rename. Any
/// failure is returned as-is; the temp file is cleaned up on drop.
/// When the destination already exists its permission bits carry over
/// (Unix); new files get `0o644` instead of tempfile's private default.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    #[cfg(unix)]
    let perms = fs::metadata(path)
        .map(|m| m.permissions())
        .unwrap_or_else(|_| std::os::unix::fs::PermissionsExt::from_mode(0o644));
    #[cfg(not(unix))]
    let perms = fs::metadata(path).map(|m| m.permissions()).ok();

    let tmp = tempfile::NamedTempFile::new_in(dir)?;

    let mut file = tmp.as_file();
    file.write_all(data)?;
    file.sync_all()?;

    #[cfg(unix)]
    fs::set_permissions(tmp.path(), perms)?;
    #[cfg(not(unix))]
    if let Some(perms) = perms {
        fs::set_permissions(tmp.path(), perms)?;
    }

    tmp.persist(path).map_err(|e| e.error)?;

    // Make the rename durable; best-effort, the data itself is synced.
    let _ = sync_dir(dir);
    Ok(())
}

/// Cross-platform directory fsync helper.
#[cfg(unix)]
pub fn sync_dir(p: &Path) -> io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let f = fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECTORY)
        .open(p)?;
    f.sync_all()
}

#[cfg(not(unix))]
pub fn sync_dir(_p: &Path) -> io::Result<()> {
    // No reliable directory fsync outside Unix; best-effort no-op.
    Ok(())
}
