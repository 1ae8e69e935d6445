//! Session layer for pagesmith.
//!
//! Owns the durable conversation history, the bounded per-session memory
//! window, the concurrency-safe session cache, and the target store.

pub mod cache;
pub mod error;
pub mod history;
pub mod memory;
pub mod targets;
pub mod types;

pub use cache::{GenerationSession, SessionCache, SessionCacheConfig};
pub use error::{SessionError, SessionResult};
pub use history::{HistoryStore, JsonlHistoryStore};
pub use memory::MemoryWindow;
pub use targets::TargetStore;
pub use types::{ChatMessage, MessageKind, Target};
