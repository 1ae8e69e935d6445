//! Stream orchestration.
//!
//! Drives one generation request through its phases: acquire the session,
//! append the user message, invoke the backend, pass every produced event
//! through to the caller while accumulating it, then parse, save and
//! persist the outcome. Partial content already delivered to the caller is
//! never retracted.

use std::sync::Arc;

use pagesmith_codegen::{
    parse, CodeLayout, GenEvent, GenerationBackend, EVENT_CHANNEL_CAPACITY,
};
use pagesmith_deploy::FileMaterializer;
use pagesmith_session::{GenerationSession, HistoryStore, MessageKind, SessionCache, Target};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, warn};

use crate::error::CoreResult;

/// Phases of one generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    Requesting,
    Streaming,
    Finalizing,
    Completed,
    Failed,
}

/// Events delivered to the caller of a generation request.
///
/// Any number of `Chunk`/`FileWritten` events is followed by exactly one
/// terminal `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Chunk { content: String },
    FileWritten { path: String },
    Done { output_dir: String },
    Error { message: String },
}

/// Top-level control component for generation requests.
pub struct StreamOrchestrator {
    backend: Arc<dyn GenerationBackend>,
    history: Arc<dyn HistoryStore>,
    sessions: Arc<SessionCache>,
    materializer: FileMaterializer,
}

impl StreamOrchestrator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        history: Arc<dyn HistoryStore>,
        sessions: Arc<SessionCache>,
        materializer: FileMaterializer,
    ) -> Self {
        Self {
            backend,
            history,
            sessions,
            materializer,
        }
    }

    /// Run one generation request for a target.
    ///
    /// Returns the caller-facing event stream. The optional `permit` is a
    /// per-target serialization guard held until the request finishes.
    pub async fn run(
        &self,
        target: &Target,
        message: &str,
        permit: Option<OwnedMutexGuard<()>>,
    ) -> CoreResult<mpsc::Receiver<StreamEvent>> {
        let target_id = target.id;
        let layout = target.layout;
        trace_phase(target_id, GenerationPhase::Requesting);

        let session = self.sessions.acquire(target_id, layout).await?;
        let user_message = self
            .history
            .append(target_id, MessageKind::User, message)
            .await?;
        session.push_message(user_message);
        let conversation = session.conversation();

        let events = match self.backend.generate_stream(conversation, layout).await {
            Ok(events) => events,
            Err(e) => {
                trace_phase(target_id, GenerationPhase::Failed);
                let text = format!("Generation failed: {}", e);
                if let Err(append_err) = self
                    .history
                    .append(target_id, MessageKind::Error, &text)
                    .await
                {
                    error!(target_id, "failed to record generation error: {}", append_err);
                }
                return Err(e.into());
            }
        };

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let worker = StreamWorker {
            history: Arc::clone(&self.history),
            materializer: self.materializer.clone(),
            session,
            target_id,
            layout,
            tx,
        };
        tokio::spawn(async move {
            // Held for the lifetime of the request under
            // ConcurrencyPolicy::SerializePerTarget.
            let _permit = permit;
            worker.consume(events).await;
        });

        Ok(rx)
    }
}

struct StreamWorker {
    history: Arc<dyn HistoryStore>,
    materializer: FileMaterializer,
    session: Arc<GenerationSession>,
    target_id: i64,
    layout: CodeLayout,
    tx: mpsc::Sender<StreamEvent>,
}

impl StreamWorker {
    async fn consume(self, mut events: mpsc::Receiver<GenEvent>) {
        trace_phase(self.target_id, GenerationPhase::Streaming);

        let mut accumulated = String::new();
        let mut written: Vec<String> = Vec::new();
        let mut connected = true;
        let mut failure: Option<String> = None;

        while let Some(event) = events.recv().await {
            match event {
                GenEvent::Chunk(content) => {
                    accumulated.push_str(&content);
                    if connected {
                        connected = self.emit(StreamEvent::Chunk { content }).await;
                        if !connected {
                            // Caller gone: stop forwarding and treat the
                            // stream as EOF so the work is not lost.
                            debug!(
                                target_id = self.target_id,
                                "caller disconnected; finalizing with accumulated content"
                            );
                            break;
                        }
                    }
                }
                GenEvent::ToolCall(write) => {
                    match self.materializer.write_project_file(
                        self.target_id,
                        &write.path,
                        &write.content,
                    ) {
                        Ok(_) => {
                            written.push(write.path.clone());
                            if connected {
                                connected =
                                    self.emit(StreamEvent::FileWritten { path: write.path }).await;
                                if !connected {
                                    debug!(
                                        target_id = self.target_id,
                                        "caller disconnected; finalizing written files"
                                    );
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            failure = Some(format!("File write failed: {}", e));
                            break;
                        }
                    }
                }
                GenEvent::Completed => break,
                GenEvent::Failed(message) => {
                    failure = Some(message);
                    break;
                }
            }
        }

        match failure {
            Some(message) => self.fail(message).await,
            None => self.finalize(accumulated, written).await,
        }
    }

    async fn finalize(&self, accumulated: String, written: Vec<String>) {
        trace_phase(self.target_id, GenerationPhase::Finalizing);

        let outcome = if self.layout.is_tool_driven() {
            if written.is_empty() {
                Err("Generation produced no files".to_string())
            } else {
                let dir = self.materializer.output_dir(self.layout, self.target_id);
                let summary = format!(
                    "Generated {} project files:\n{}",
                    written.len(),
                    written.join("\n")
                );
                Ok((dir, summary))
            }
        } else {
            match parse(&accumulated, self.layout) {
                Ok(artifact) => match self.materializer.save(&artifact, self.target_id) {
                    Ok(dir) => Ok((dir, accumulated.clone())),
                    Err(e) => Err(format!("Save failed: {}", e)),
                },
                Err(e) => Err(format!("Parse failed: {}", e)),
            }
        };

        match outcome {
            Ok((output_dir, assistant_content)) => {
                match self
                    .history
                    .append(self.target_id, MessageKind::Assistant, &assistant_content)
                    .await
                {
                    Ok(message) => self.session.push_message(message),
                    Err(e) => {
                        self.fail(format!("Failed to persist assistant message: {}", e))
                            .await;
                        return;
                    }
                }
                let _ = self
                    .emit(StreamEvent::Done {
                        output_dir: output_dir.display().to_string(),
                    })
                    .await;
                trace_phase(self.target_id, GenerationPhase::Completed);
            }
            Err(message) => self.fail(message).await,
        }
    }

    /// Record the failure in history (tagged distinctly from assistant
    /// output) and emit the terminal error event. Chunks already delivered
    /// stand.
    async fn fail(&self, message: String) {
        trace_phase(self.target_id, GenerationPhase::Failed);
        warn!(target_id = self.target_id, "generation failed: {}", message);

        if let Err(e) = self
            .history
            .append(self.target_id, MessageKind::Error, &message)
            .await
        {
            error!(target_id = self.target_id, "failed to record error entry: {}", e);
        }
        let _ = self.emit(StreamEvent::Error { message }).await;
    }

    async fn emit(&self, event: StreamEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

fn trace_phase(target_id: i64, phase: GenerationPhase) {
    debug!(target_id, ?phase, "generation phase");
}
