//! Error types for the queue and the remote store.

use std::path::PathBuf;
use thiserror::Error;

/// A remote write that did not succeed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The request never produced a response (DNS, refused, timeout)
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote store answered with a non-success status
    #[error("remote rejected request with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Update or delete payload without the column used to match rows
    #[error("payload has no '{0}' to match on")]
    MissingKey(String),

    /// The response could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Whether this failure looks like lost connectivity rather than a rejection
    pub fn is_connection(&self) -> bool {
        matches!(self, RemoteError::Connection(_))
    }
}

/// Errors surfaced by [`crate::queue::OfflineQueue`]
#[derive(Debug, Error)]
pub enum QueueError {
    /// The caller passed an operation that can never succeed
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Online write rejected by the remote store
    #[error("remote operation on '{table}' failed: {source}")]
    Remote {
        table: String,
        #[source]
        source: RemoteError,
    },

    /// The local queue file could not be read or written
    #[error("queue persistence failed at {}: {message}", .path.display())]
    Persistence { path: PathBuf, message: String },
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;
