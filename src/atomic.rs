//! Crash-safe file replacement
//!
//! Content goes to a temp file in the target's directory (same filesystem),
//! is synced, then renamed over the target. Observers see the old file or the
//! new one, never a partial write.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::constants::atomic::TEMP_PREFIX;
use crate::error::{EditError, EditResult};
use crate::protect;

/// Moves a fully written temp file onto the target path
pub type ReplaceFn = fn(NamedTempFile, &Path) -> io::Result<()>;

/// Default replace step: atomic rename via `NamedTempFile::persist`
pub fn persist_temp(temp: NamedTempFile, target: &Path) -> io::Result<()> {
    temp.persist(target).map(|_| ()).map_err(|e| e.error)
}

/// Atomically replace `target` with `contents`.
pub fn write_atomic(target: &Path, contents: &[u8]) -> EditResult<()> {
    write_atomic_with(target, contents, persist_temp)
}

/// Atomically replace `target`, using `replace` for the final swap.
///
/// A read-only target is made writable for the swap and its original
/// protection is put back afterwards, whether or not the swap succeeded.
/// On failure the temp file is removed and the target is left untouched.
pub fn write_atomic_with(target: &Path, contents: &[u8], replace: ReplaceFn) -> EditResult<()> {
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let guard = protect::scoped_writable(target);

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| EditError::io("create temp file", dir, e))?;

    temp.write_all(contents)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| EditError::io("write temp file", temp.path(), e))?;

    // Keep the target's mode; tempfile creates owner-only files
    if let Ok(meta) = fs::metadata(target)
        && let Err(e) = fs::set_permissions(temp.path(), meta.permissions())
    {
        warn!(path = %target.display(), error = %e, "Could not carry permissions over to new profile");
    }

    let temp_path = temp.path().to_path_buf();
    replace(temp, target).map_err(|source| EditError::Persist {
        path: target.to_path_buf(),
        source,
    })?;

    debug!(path = %target.display(), temp = %temp_path.display(), "Atomically wrote file");
    drop(guard);
    Ok(())
}
