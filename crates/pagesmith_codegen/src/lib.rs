//! Code generation layer for pagesmith.
//!
//! This crate defines the shape of generated code (layouts and artifacts),
//! the parser that turns raw model output into structured artifacts, and
//! the generation-backend interface with its HTTP adapter.

pub mod artifact;
pub mod backend;
pub mod error;
pub mod layout;
pub mod llm;
pub mod mock;
pub mod parser;
pub mod router;

pub use artifact::CodeArtifact;
pub use backend::{
    ChatTurn, GenEvent, GenerationBackend, ToolFileWrite, TurnRole, EVENT_CHANNEL_CAPACITY,
};
pub use error::{CodegenError, CodegenResult};
pub use layout::CodeLayout;
pub use llm::{LlmClient, LlmProvider};
pub use mock::ScriptedBackend;
pub use parser::parse;
pub use router::{FixedRouter, LayoutRouter, LlmLayoutRouter};
