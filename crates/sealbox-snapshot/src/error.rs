//! Snapshot filesystem error types.

use std::io;
use thiserror::Error;

/// Result type for snapshot filesystem operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Errors raised by the payload reader, the archive filesystem, and the
/// overlay that unions it with the real filesystem.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Layout header out of range, or the blob was shorter than it promised
    #[error("invalid payload header: {0}")]
    HeaderInvalid(String),

    /// Path absent in the backing filesystem selected for it
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// Directory operation on a file
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// File operation on a directory
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Write attempt under the virtual root
    #[error("read-only file system: {0}")]
    ReadOnly(String),

    /// The embedded archive could not be parsed
    #[error("archive error: {0}")]
    Archive(String),

    /// I/O error from the real filesystem
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SnapshotError {
    /// True when the error means the path simply does not exist, on either
    /// side of the overlay.
    pub fn is_not_found(&self) -> bool {
        match self {
            SnapshotError::NotFound(_) => true,
            SnapshotError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
