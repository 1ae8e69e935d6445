//! Scripted generation backend for testing.
//!
//! Provides a configurable implementation of the GenerationBackend trait
//! that replays predefined event scripts without talking to a real model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::backend::{
    ChatTurn, GenEvent, GenerationBackend, EVENT_CHANNEL_CAPACITY,
};
use crate::error::{CodegenError, CodegenResult};
use crate::layout::CodeLayout;

/// Captured invocation information for verification.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub layout: CodeLayout,
    pub conversation: Vec<ChatTurn>,
}

/// Scripted backend that replays predefined event sequences.
///
/// Each call to `generate_stream` consumes the next script in order; the
/// last script is reused once the list is exhausted.
#[derive(Clone)]
pub struct ScriptedBackend {
    scripts: Arc<RwLock<Vec<Vec<GenEvent>>>>,
    script_index: Arc<AtomicUsize>,
    captured: Arc<RwLock<Vec<CapturedRequest>>>,
    fail_with: Arc<RwLock<Option<String>>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(RwLock::new(Vec::new())),
            script_index: Arc::new(AtomicUsize::new(0)),
            captured: Arc::new(RwLock::new(Vec::new())),
            fail_with: Arc::new(RwLock::new(None)),
        }
    }

    /// Add a script to replay on the next stream call.
    pub fn add_script(self, events: Vec<GenEvent>) -> Self {
        self.scripts.write().push(events);
        self
    }

    /// Script a plain text generation: chunks followed by `Completed`.
    pub fn with_text(self, chunks: &[&str]) -> Self {
        let mut events: Vec<GenEvent> =
            chunks.iter().map(|c| GenEvent::Chunk((*c).to_string())).collect();
        events.push(GenEvent::Completed);
        self.add_script(events)
    }

    /// Make every call fail before producing a stream.
    pub fn fail_with(self, message: impl Into<String>) -> Self {
        *self.fail_with.write() = Some(message.into());
        self
    }

    /// Requests captured so far.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.read().clone()
    }

    pub fn request_count(&self) -> usize {
        self.captured.read().len()
    }

    fn next_script(&self) -> Vec<GenEvent> {
        let scripts = self.scripts.read();
        if scripts.is_empty() {
            return vec![GenEvent::Completed];
        }
        let index = self.script_index.fetch_add(1, Ordering::SeqCst);
        scripts
            .get(index.min(scripts.len() - 1))
            .cloned()
            .unwrap_or_else(|| vec![GenEvent::Completed])
    }

    fn check_failure(&self) -> CodegenResult<()> {
        if let Some(msg) = self.fail_with.read().clone() {
            return Err(CodegenError::Backend(msg));
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(
        &self,
        conversation: &[ChatTurn],
        layout: CodeLayout,
    ) -> CodegenResult<String> {
        self.check_failure()?;
        self.captured.write().push(CapturedRequest {
            layout,
            conversation: conversation.to_vec(),
        });
        let text: String = self
            .next_script()
            .into_iter()
            .filter_map(|e| match e {
                GenEvent::Chunk(c) => Some(c),
                _ => None,
            })
            .collect();
        Ok(text)
    }

    async fn generate_stream(
        &self,
        conversation: Vec<ChatTurn>,
        layout: CodeLayout,
    ) -> CodegenResult<mpsc::Receiver<GenEvent>> {
        self.check_failure()?;
        self.captured.write().push(CapturedRequest {
            layout,
            conversation,
        });
        let events = self.next_script();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}
