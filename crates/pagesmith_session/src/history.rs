//! Durable conversation history.
//!
//! History is stored per target under:
//! `<data_root>/history/<target_id>/messages.jsonl`
//!
//! The log is append-only, one JSON object per line. Individual entries
//! are never updated or deleted; the whole log is removed only when the
//! owning target is deleted.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::error::SessionResult;
use crate::types::{ChatMessage, MessageKind};

/// Read/write contract for the conversation record.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one message and return the stored record.
    async fn append(
        &self,
        target_id: i64,
        kind: MessageKind,
        content: &str,
    ) -> SessionResult<ChatMessage>;

    /// The `limit` most recent messages, ordered oldest to newest.
    async fn list_recent(&self, target_id: i64, limit: usize) -> SessionResult<Vec<ChatMessage>>;

    /// Remove every message of a target. Used only on target deletion.
    async fn delete_all(&self, target_id: i64) -> SessionResult<()>;
}

/// Append-only JSONL history store.
#[derive(Clone)]
pub struct JsonlHistoryStore {
    data_root: PathBuf,
}

impl JsonlHistoryStore {
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self {
            data_root: data_root.as_ref().to_path_buf(),
        }
    }

    fn target_dir(&self, target_id: i64) -> PathBuf {
        self.data_root.join("history").join(target_id.to_string())
    }

    fn messages_path(&self, target_id: i64) -> PathBuf {
        self.target_dir(target_id).join("messages.jsonl")
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn append(
        &self,
        target_id: i64,
        kind: MessageKind,
        content: &str,
    ) -> SessionResult<ChatMessage> {
        let message = ChatMessage::new(target_id, kind, content);

        fs::create_dir_all(self.target_dir(target_id))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.messages_path(target_id))?;
        let json = serde_json::to_string(&message)?;
        writeln!(file, "{}", json)?;

        Ok(message)
    }

    async fn list_recent(&self, target_id: i64, limit: usize) -> SessionResult<Vec<ChatMessage>> {
        let path = self.messages_path(target_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut messages = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ChatMessage>(&line) {
                Ok(message) => messages.push(message),
                // A torn trailing line (crash mid-append) must not poison
                // the whole history.
                Err(e) => warn!(target_id, "skipping unreadable history line: {}", e),
            }
        }

        if messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }
        Ok(messages)
    }

    async fn delete_all(&self, target_id: i64) -> SessionResult<()> {
        let dir = self.target_dir(target_id);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_append_and_list_round_trip() {
        let temp = tempdir().unwrap();
        let store = JsonlHistoryStore::new(temp.path());

        store.append(42, MessageKind::User, "make a page").await.unwrap();
        store.append(42, MessageKind::Assistant, "<html/>").await.unwrap();

        let messages = store.list_recent(42, 10).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].kind, MessageKind::User);
        assert_eq!(messages[1].kind, MessageKind::Assistant);
        assert_eq!(messages[1].content, "<html/>");
    }

    #[tokio::test]
    async fn test_list_recent_keeps_newest_oldest_first() {
        let temp = tempdir().unwrap();
        let store = JsonlHistoryStore::new(temp.path());

        for i in 0..10 {
            store
                .append(1, MessageKind::User, &format!("m{}", i))
                .await
                .unwrap();
        }

        let messages = store.list_recent(1, 3).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m7", "m8", "m9"]);
    }

    #[tokio::test]
    async fn test_list_recent_missing_target_is_empty() {
        let temp = tempdir().unwrap();
        let store = JsonlHistoryStore::new(temp.path());
        assert!(store.list_recent(999, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_removes_log() {
        let temp = tempdir().unwrap();
        let store = JsonlHistoryStore::new(temp.path());

        store.append(5, MessageKind::User, "x").await.unwrap();
        store.delete_all(5).await.unwrap();

        assert!(store.list_recent(5, 10).await.unwrap().is_empty());
        // Deleting again is a no-op.
        store.delete_all(5).await.unwrap();
    }

    #[tokio::test]
    async fn test_torn_line_is_skipped() {
        let temp = tempdir().unwrap();
        let store = JsonlHistoryStore::new(temp.path());

        store.append(6, MessageKind::User, "ok").await.unwrap();
        let path = temp.path().join("history").join("6").join("messages.jsonl");
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        writeln!(file, "{{\"id\": \"trunca").unwrap();

        let messages = store.list_recent(6, 10).await.unwrap();
        assert_eq!(messages.len(), 1);
    }
}
