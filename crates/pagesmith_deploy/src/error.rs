//! Error types for materialization and deploy.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for deploy-layer operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors that can occur while materializing, building or deploying.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Missing required {field} content in {layout} artifact")]
    MissingField {
        layout: &'static str,
        field: &'static str,
    },

    #[error("Source directory does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("Project file path escapes the project root: {0}")]
    PathTraversal(String),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Build timed out after {0}s")]
    BuildTimeout(u64),

    #[error("Deploy copy failed: {0}")]
    Copy(String),

    #[error("Screenshot capture failed: {0}")]
    Screenshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
