//! Runtime integration error types.

use sealbox_snapshot::SnapshotError;

/// Errors surfaced by installation and bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Mounting the payload failed: bad header, unreadable blob, or a
    /// malformed archive
    #[error("{0}")]
    Snapshot(#[from] SnapshotError),

    /// No layout header was deposited for bootstrap to pick up
    #[error("no payload header attached to the process")]
    MissingPayload,

    /// File I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
