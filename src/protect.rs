//! Read-only protection for the profile file
//!
//! The game rewrites its profile on exit, so the editor marks the file
//! read-only after applying settings. Protection is best effort: every call
//! here logs and degrades instead of failing the edit pipeline.

use std::fs::{self, Permissions};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Write bits for owner, group and other
#[cfg(unix)]
const ALL_WRITE_BITS: u32 = 0o222;

/// Owner write bit, the only one granted back when clearing protection
#[cfg(unix)]
const OWNER_WRITE_BIT: u32 = 0o200;

fn read_permissions(path: &Path) -> std::io::Result<Permissions> {
    fs::metadata(path).map(|m| m.permissions())
}

#[cfg(unix)]
fn with_readonly(mut perms: Permissions, readonly: bool) -> Permissions {
    let mode = perms.mode();
    let mode = if readonly {
        mode & !ALL_WRITE_BITS
    } else {
        mode | OWNER_WRITE_BIT
    };
    perms.set_mode(mode);
    perms
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn with_readonly(mut perms: Permissions, readonly: bool) -> Permissions {
    perms.set_readonly(readonly);
    perms
}

fn apply_readonly(path: &Path, readonly: bool) -> std::io::Result<bool> {
    let perms = read_permissions(path)?;
    fs::set_permissions(path, with_readonly(perms, readonly))?;
    Ok(read_permissions(path)?.readonly() == readonly)
}

/// Set the file read-only. Returns true only if a re-read confirms it.
pub fn set_readonly(path: &Path) -> bool {
    match apply_readonly(path, true) {
        Ok(true) => {
            info!(path = %path.display(), "Set read-only");
            true
        }
        Ok(false) => {
            error!(path = %path.display(), "Read-only bit did not stick");
            false
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to set read-only");
            false
        }
    }
}

/// Clear the read-only bit. Returns true only if a re-read confirms it.
pub fn remove_readonly(path: &Path) -> bool {
    match apply_readonly(path, false) {
        Ok(true) => {
            info!(path = %path.display(), "Removed read-only");
            true
        }
        Ok(false) => {
            error!(path = %path.display(), "File is still read-only after clearing");
            false
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to remove read-only");
            false
        }
    }
}

/// Query the read-only bit. Any error reads as "not protected".
pub fn is_readonly(path: &Path) -> bool {
    read_permissions(path)
        .map(|p| p.readonly())
        .inspect_err(|e| error!(path = %path.display(), error = %e, "Failed to check read-only status"))
        .unwrap_or(false)
}

/// Temporarily writable file handle
///
/// Created by [`scoped_writable`]. While alive the file is writable; on drop
/// the original permissions are put back if they were changed, including
/// when the holder returns early or unwinds.
#[derive(Debug)]
pub struct WritableGuard {
    path: PathBuf,
    original: Option<Permissions>,
}

impl WritableGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file was read-only when the guard was taken
    pub fn was_readonly(&self) -> bool {
        self.original.is_some()
    }
}

impl Drop for WritableGuard {
    fn drop(&mut self) {
        let Some(original) = self.original.take() else {
            return;
        };
        match fs::set_permissions(&self.path, original) {
            Ok(()) => debug!(path = %self.path.display(), "Restored read-only"),
            Err(e) => error!(path = %self.path.display(), error = %e, "Failed to restore read-only attribute"),
        }
    }
}

/// Make `path` writable until the returned guard is dropped.
pub fn scoped_writable(path: &Path) -> WritableGuard {
    let original = match read_permissions(path) {
        Ok(perms) if perms.readonly() => Some(perms),
        Ok(_) => None,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to get file attributes");
            None
        }
    };

    let original = original.and_then(|perms| {
        match fs::set_permissions(path, with_readonly(perms.clone(), false)) {
            Ok(()) => {
                debug!(path = %path.display(), "Temporarily removed read-only");
                Some(perms)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to make file writable");
                None
            }
        }
    });

    WritableGuard {
        path: path.to_path_buf(),
        original,
    }
}

/// Run `f` with `path` writable, restoring protection afterwards.
pub fn with_writable<T>(path: &Path, f: impl FnOnce(&Path) -> T) -> T {
    let guard = scoped_writable(path);
    f(guard.path())
}
