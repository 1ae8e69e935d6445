//! Error types for the session crate.

use thiserror::Error;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur in the session layer.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Target not found: {0}")]
    TargetNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
