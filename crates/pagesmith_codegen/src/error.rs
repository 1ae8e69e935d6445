//! Error types for the codegen crate.

use thiserror::Error;

/// Result type alias for codegen operations.
pub type CodegenResult<T> = Result<T, CodegenError>;

/// Errors that can occur while generating or structuring code.
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("Generation backend error: {0}")]
    Backend(String),

    #[error("Generation backend not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    NotConfigured,

    #[error("Cannot parse {layout} output: {reason}")]
    Parse { layout: String, reason: String },

    #[error("Layout {0} is not handled by this operation")]
    UnsupportedLayout(String),

    #[error("Layout classification failed: {0}")]
    Routing(String),
}
