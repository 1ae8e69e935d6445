//! Target service.
//!
//! The public operations of the system: create a target, chat to generate
//! code, deploy, inspect history, delete. Ownership is an id comparison;
//! authentication lives outside this crate.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use pagesmith_codegen::{GenerationBackend, LayoutRouter};
use pagesmith_deploy::{
    generate_deploy_key, DeployManager, FileMaterializer, ProjectBuilder, ScreenshotService,
};
use pagesmith_session::{
    ChatMessage, HistoryStore, JsonlHistoryStore, SessionCache, Target, TargetStore,
};
use tokio::sync::Mutex as AsyncMutex;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::config::{ConcurrencyPolicy, PagesmithConfig};
use crate::error::{CoreError, CoreResult};
use crate::orchestrator::{StreamEvent, StreamOrchestrator};

/// Coordinates targets, sessions, generation and deploy.
pub struct TargetService {
    config: PagesmithConfig,
    targets: TargetStore,
    history: Arc<dyn HistoryStore>,
    router: Arc<dyn LayoutRouter>,
    orchestrator: StreamOrchestrator,
    materializer: FileMaterializer,
    builder: ProjectBuilder,
    deploys: DeployManager,
    screenshots: Option<Arc<ScreenshotService>>,
    request_locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl TargetService {
    pub fn new(
        config: PagesmithConfig,
        backend: Arc<dyn GenerationBackend>,
        router: Arc<dyn LayoutRouter>,
        screenshots: Option<Arc<ScreenshotService>>,
    ) -> Self {
        let history: Arc<dyn HistoryStore> =
            Arc::new(JsonlHistoryStore::new(&config.data_root));
        let sessions = Arc::new(SessionCache::new(
            config.session_cache_config(),
            Arc::clone(&history),
        ));
        let materializer = FileMaterializer::new(&config.output_root);
        let orchestrator = StreamOrchestrator::new(
            backend,
            Arc::clone(&history),
            sessions,
            materializer.clone(),
        );
        let builder = ProjectBuilder::new(config.build_config());
        let deploys = DeployManager::new(&config.deploy_root, config.deploy_host.clone());
        let targets = TargetStore::new(&config.data_root);

        Self {
            config,
            targets,
            history,
            router,
            orchestrator,
            materializer,
            builder,
            deploys,
            screenshots,
            request_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a target: classify the layout from the initial prompt and
    /// persist the record. A routing failure fails the whole creation.
    pub async fn create_target(&self, init_prompt: &str, owner_id: i64) -> CoreResult<Target> {
        if init_prompt.trim().is_empty() {
            return Err(CoreError::Validation(
                "initial prompt must not be empty".to_string(),
            ));
        }
        let layout = self.router.classify(init_prompt).await?;
        let target = self.targets.create(init_prompt, owner_id, layout)?;
        info!(target_id = target.id, %layout, "target created");
        Ok(target)
    }

    /// Run one generation request and return the caller-facing stream.
    pub async fn chat_to_gen_code(
        &self,
        target_id: i64,
        message: &str,
        owner_id: i64,
    ) -> CoreResult<ReceiverStream<StreamEvent>> {
        let target = self.owned_target(target_id, owner_id)?;
        if message.trim().is_empty() {
            return Err(CoreError::Validation("message must not be empty".to_string()));
        }

        let permit = match self.config.concurrency {
            ConcurrencyPolicy::Allow => None,
            ConcurrencyPolicy::SerializePerTarget => {
                let lock = {
                    let mut locks = self.request_locks.lock();
                    Arc::clone(
                        locks
                            .entry(target_id)
                            .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
                    )
                };
                Some(lock.lock_owned().await)
            }
        };

        let events = self.orchestrator.run(&target, message, permit).await?;
        Ok(ReceiverStream::new(events))
    }

    /// Build (when the layout requires it) and publish a target's output,
    /// returning the public URL.
    pub async fn deploy_target(&self, target_id: i64, owner_id: i64) -> CoreResult<String> {
        let target = self.owned_target(target_id, owner_id)?;

        let source = self.materializer.output_dir(target.layout, target.id);
        if !source.is_dir() {
            return Err(CoreError::Validation(
                "no generated code for target; run a generation first".to_string(),
            ));
        }

        // A failed build returns here without touching any existing slot.
        let publish_dir = if target.layout.needs_build() {
            self.builder.build(&source).await?
        } else {
            source
        };

        let deploy_key = target
            .deploy_key
            .clone()
            .unwrap_or_else(generate_deploy_key);
        let url = self.deploys.deploy(&deploy_key, &publish_dir).await?;
        self.targets.record_deploy(target.id, &deploy_key, Utc::now())?;
        info!(target_id, deploy_key, url, "target deployed");

        self.spawn_screenshot(target.id, url.clone());
        Ok(url)
    }

    /// Delete the target record and its whole conversation history.
    pub async fn delete_target(&self, target_id: i64, owner_id: i64) -> CoreResult<()> {
        self.owned_target(target_id, owner_id)?;
        self.targets.delete(target_id)?;
        self.history.delete_all(target_id).await?;
        Ok(())
    }

    /// The `limit` most recent history entries, oldest first.
    pub async fn list_history(
        &self,
        target_id: i64,
        owner_id: i64,
        limit: usize,
    ) -> CoreResult<Vec<ChatMessage>> {
        self.owned_target(target_id, owner_id)?;
        Ok(self.history.list_recent(target_id, limit).await?)
    }

    pub fn get_target(&self, target_id: i64, owner_id: i64) -> CoreResult<Target> {
        self.owned_target(target_id, owner_id)
    }

    pub fn list_targets(&self, owner_id: i64) -> CoreResult<Vec<Target>> {
        let mut targets = self.targets.list()?;
        targets.retain(|t| t.owner_id == owner_id);
        Ok(targets)
    }

    fn owned_target(&self, target_id: i64, owner_id: i64) -> CoreResult<Target> {
        let target = self.targets.get(target_id)?;
        if target.owner_id != owner_id {
            return Err(CoreError::Unauthorized(target_id));
        }
        Ok(target)
    }

    // Screenshot capture runs detached; its outcome never affects the
    // deploy result.
    fn spawn_screenshot(&self, target_id: i64, url: String) {
        let Some(service) = self.screenshots.as_ref().map(Arc::clone) else {
            return;
        };
        let targets = self.targets.clone();
        tokio::spawn(async move {
            match service.capture_and_upload(&url).await {
                Ok(cover_url) => {
                    if let Err(e) = targets.set_cover(target_id, &cover_url) {
                        warn!(target_id, "failed to record cover url: {}", e);
                    }
                }
                Err(e) => warn!(target_id, "screenshot capture failed: {}", e),
            }
        });
    }
}
