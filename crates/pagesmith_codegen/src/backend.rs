//! Generation backend interface.
//!
//! The language model itself is an external collaborator; this module
//! defines the conversation shape sent to it and the event stream it
//! produces. Streams are tokio mpsc channels: the sender side lives with
//! the backend, the orchestrator consumes the receiver.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::CodegenResult;
use crate::layout::CodeLayout;

/// Role of one conversation turn sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// One turn of the conversation context supplied to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// A file write requested by the model through a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFileWrite {
    /// Path relative to the target's project root.
    pub path: String,
    /// Full file content, replacing anything already there.
    pub content: String,
}

/// One event of a generation stream.
///
/// A well-formed stream is any number of `Chunk`/`ToolCall` events followed
/// by exactly one terminal `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenEvent {
    /// A piece of generated text, delivered in production order.
    Chunk(String),
    /// A structured file-write instruction (tool-driven layouts only).
    ToolCall(ToolFileWrite),
    /// End of stream; the generation finished normally.
    Completed,
    /// End of stream; the backend failed mid-generation.
    Failed(String),
}

/// Buffer size for generation event channels.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A capability that turns a conversation into generated code.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Produce the complete generation result in one call.
    async fn generate(
        &self,
        conversation: &[ChatTurn],
        layout: CodeLayout,
    ) -> CodegenResult<String>;

    /// Produce a stream of generation events for the conversation.
    ///
    /// The returned receiver yields chunks (or tool calls for tool-driven
    /// layouts) in production order and is closed after the terminal event.
    async fn generate_stream(
        &self,
        conversation: Vec<ChatTurn>,
        layout: CodeLayout,
    ) -> CodegenResult<mpsc::Receiver<GenEvent>>;
}
