//! Core orchestration for pagesmith.
//!
//! Coordinates the session cache, the generation backend, parsing,
//! materialization and deploy into the target-facing operations: create,
//! chat-to-generate, deploy, delete.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod service;

pub use config::{ConcurrencyPolicy, PagesmithConfig};
pub use error::{CoreError, CoreResult};
pub use orchestrator::{GenerationPhase, StreamEvent, StreamOrchestrator};
pub use service::TargetService;
