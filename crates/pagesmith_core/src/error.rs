//! Error types for the core module.

use pagesmith_codegen::CodegenError;
use pagesmith_deploy::DeployError;
use pagesmith_session::SessionError;
use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Target not found: {0}")]
    NotFound(i64),

    #[error("No permission to operate on target {0}")]
    Unauthorized(i64),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Session error: {0}")]
    Session(SessionError),

    #[error("Generation error: {0}")]
    Codegen(#[from] CodegenError),

    #[error("Deploy error: {0}")]
    Deploy(#[from] DeployError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SessionError> for CoreError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::TargetNotFound(id) => Self::NotFound(id),
            other => Self::Session(other),
        }
    }
}
