//! Snapshot stream errors.

use worker_component::VtableError;

/// Errors raised by snapshot input and output streams.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The underlying file could not be read or written.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot contents are corrupt or cannot be represented.
    #[error("invalid snapshot data: {0}")]
    Format(String),

    /// A component could not be converted through its vtable.
    #[error(transparent)]
    Vtable(#[from] VtableError),
}
