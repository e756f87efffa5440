//! Error types for profile editing
//!
//! Errors carry the operation and path that failed so the engine can turn
//! them into a short user-facing message without losing context in the logs.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for profile edit operations.
pub type EditResult<T> = Result<T, EditError>;

/// Errors produced while backing up, reading or rewriting the profile.
#[derive(Debug, Error)]
pub enum EditError {
    /// The profile (or a backup) does not exist.
    #[error("file not found: {}", path.display())]
    NotFound {
        /// Path that was expected to exist.
        path: PathBuf,
    },
    /// IO failures while interacting with the filesystem.
    #[error("{operation} failed for {}: {source}", path.display())]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The temp file could not be renamed over the target.
    #[error("atomic replace of {} failed: {source}", path.display())]
    Persist {
        /// Target of the replace.
        path: PathBuf,
        /// Underlying IO error from the rename.
        source: io::Error,
    },
    /// A path that should name a backup does not carry the backup suffix.
    #[error("not a backup file: {}", path.display())]
    NotABackup {
        /// Offending path.
        path: PathBuf,
    },
}

impl EditError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
