//! Session cache with lookup-or-create semantics.
//!
//! Sessions are cached per `(target_id, layout)`. Concurrent callers for
//! the same key observe exactly one construction: the map entry holds an
//! async once-cell, so misses for one key collapse into a single
//! constructor invocation while other keys proceed independently.
//!
//! Eviction fires on capacity, time since last write, or time since last
//! access, whichever comes first. It is a log-only event: callers already
//! holding a session keep using it, and persisted history is untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pagesmith_codegen::{ChatTurn, CodeLayout};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::SessionResult;
use crate::history::HistoryStore;
use crate::memory::MemoryWindow;
use crate::types::ChatMessage;

/// Cache tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionCacheConfig {
    /// Maximum number of cached sessions.
    pub capacity: usize,
    /// Evict sessions not written to for this long.
    pub ttl_after_write: Duration,
    /// Evict sessions not acquired for this long.
    pub ttl_after_access: Duration,
    /// Maximum history entries replayed on construction.
    pub replay_limit: usize,
    /// Memory window size per session.
    pub window_size: usize,
}

impl Default for SessionCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_after_write: Duration::from_secs(30 * 60),
            ttl_after_access: Duration::from_secs(10 * 60),
            replay_limit: 20,
            window_size: 20,
        }
    }
}

/// One cached conversation session for a `(target, layout)` pair.
pub struct GenerationSession {
    target_id: i64,
    layout: CodeLayout,
    window: Mutex<MemoryWindow>,
    last_write: Mutex<Instant>,
}

impl GenerationSession {
    fn new(target_id: i64, layout: CodeLayout, window_size: usize) -> Self {
        Self {
            target_id,
            layout,
            window: Mutex::new(MemoryWindow::new(window_size)),
            last_write: Mutex::new(Instant::now()),
        }
    }

    pub fn target_id(&self) -> i64 {
        self.target_id
    }

    pub fn layout(&self) -> CodeLayout {
        self.layout
    }

    /// Append a message to the memory window.
    pub fn push_message(&self, message: ChatMessage) {
        self.window.lock().push(message);
        *self.last_write.lock() = Instant::now();
    }

    /// The current window as backend conversation turns, oldest first.
    pub fn conversation(&self) -> Vec<ChatTurn> {
        self.window.lock().snapshot().iter().map(Into::into).collect()
    }

    pub fn memory_len(&self) -> usize {
        self.window.lock().len()
    }

    fn replay(&self, messages: Vec<ChatMessage>) {
        self.window.lock().replace_all(messages);
        *self.last_write.lock() = Instant::now();
    }

    fn last_write(&self) -> Instant {
        *self.last_write.lock()
    }
}

type CacheKey = (i64, CodeLayout);

struct CacheEntry {
    cell: Arc<OnceCell<Arc<GenerationSession>>>,
    inserted_at: Instant,
    last_access: Instant,
}

/// Keyed cache of generation sessions.
pub struct SessionCache {
    config: SessionCacheConfig,
    history: Arc<dyn HistoryStore>,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    constructions: AtomicU64,
}

impl SessionCache {
    pub fn new(config: SessionCacheConfig, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            config,
            history,
            entries: Mutex::new(HashMap::new()),
            constructions: AtomicU64::new(0),
        }
    }

    /// Look up or create the session for a `(target, layout)` pair.
    ///
    /// Construction replays up to `replay_limit` persisted history entries
    /// (oldest first) into a fresh memory window before returning.
    pub async fn acquire(
        &self,
        target_id: i64,
        layout: CodeLayout,
    ) -> SessionResult<Arc<GenerationSession>> {
        let key = (target_id, layout);
        let cell = {
            let mut entries = self.entries.lock();
            let now = Instant::now();
            self.sweep(&mut entries, now);
            let entry = entries.entry(key).or_insert_with(|| CacheEntry {
                cell: Arc::new(OnceCell::new()),
                inserted_at: now,
                last_access: now,
            });
            entry.last_access = now;
            let cell = Arc::clone(&entry.cell);
            self.evict_over_capacity(&mut entries, key);
            cell
        };
        // The map lock is released before awaiting construction; the
        // once-cell alone serializes same-key constructors.

        let session = cell
            .get_or_try_init(|| async {
                self.constructions.fetch_add(1, Ordering::Relaxed);
                debug!(target_id, %layout, "constructing generation session");
                let session = Arc::new(GenerationSession::new(
                    target_id,
                    layout,
                    self.config.window_size,
                ));
                let recent = self
                    .history
                    .list_recent(target_id, self.config.replay_limit)
                    .await?;
                if !recent.is_empty() {
                    info!(
                        target_id,
                        count = recent.len(),
                        "replayed history into session memory"
                    );
                    session.replay(recent);
                }
                Ok::<_, crate::error::SessionError>(session)
            })
            .await?;

        Ok(Arc::clone(session))
    }

    /// Number of sessions constructed so far. Used to verify the
    /// at-most-one-construction guarantee.
    pub fn construction_count(&self) -> u64 {
        self.constructions.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn sweep(&self, entries: &mut HashMap<CacheKey, CacheEntry>, now: Instant) {
        let mut evicted = Vec::new();
        entries.retain(|key, entry| {
            let last_write = entry
                .cell
                .get()
                .map(|session| session.last_write())
                .unwrap_or(entry.inserted_at);
            let reason = if now.duration_since(entry.last_access) > self.config.ttl_after_access {
                Some("idle")
            } else if now.duration_since(last_write) > self.config.ttl_after_write {
                Some("stale")
            } else {
                None
            };
            match reason {
                Some(reason) => {
                    evicted.push((*key, reason));
                    false
                }
                None => true,
            }
        });
        for ((target_id, layout), reason) in evicted {
            info!(target_id, %layout, reason, "evicted generation session");
        }
    }

    fn evict_over_capacity(&self, entries: &mut HashMap<CacheKey, CacheEntry>, keep: CacheKey) {
        while entries.len() > self.config.capacity {
            let oldest = entries
                .iter()
                .filter(|(key, _)| **key != keep)
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| *key);
            let Some(key) = oldest else { break };
            entries.remove(&key);
            info!(
                target_id = key.0,
                layout = %key.1,
                reason = "capacity",
                "evicted generation session"
            );
        }
    }
}
