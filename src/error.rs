//! Error types for the replication logger

use thiserror::Error;

/// Result type alias for replication-logger operations
pub type Result<T> = std::result::Result<T, LogError>;

/// Discriminated status surfaced by every logger operation.
///
/// Mirrors the original replication logger's status codes rather than a
/// single opaque error string.
#[derive(Error, Debug)]
pub enum LogError {
    /// The logger's directory does not exist.
    #[error("replication log directory not found: {0}")]
    NotFound(String),

    /// The logger's directory exists but is not writable.
    #[error("replication log directory not writable: {0}")]
    NotWritable(String),

    /// Buffer or JSON allocation failure while encoding an event.
    #[error("out of memory encoding replication event: {0}")]
    OutOfMemory(String),

    /// Any I/O failure (write/fsync/open/rename/unlink/seek) or an encoder
    /// failure caused by an unrecognized marker/operation kind.
    #[error("internal replication log error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for LogError {
    fn from(e: std::io::Error) -> Self {
        LogError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for LogError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            LogError::Internal(e.to_string())
        } else {
            LogError::OutOfMemory(e.to_string())
        }
    }
}
