//! Core records for targets and their conversation history.

use chrono::{DateTime, Utc};
use pagesmith_codegen::{ChatTurn, CodeLayout};
use serde::{Deserialize, Serialize};

/// Kind of a persisted chat message.
///
/// `Error` entries record failed generations distinctly from normal
/// assistant output, so the conversation record reflects the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Assistant,
    Error,
}

/// One immutable, append-only conversation entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID (UUID)
    pub id: String,
    #[serde(rename = "targetId")]
    pub target_id: i64,
    pub kind: MessageKind,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(target_id: i64, kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target_id,
            kind,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(target_id: i64, content: impl Into<String>) -> Self {
        Self::new(target_id, MessageKind::User, content)
    }

    pub fn assistant(target_id: i64, content: impl Into<String>) -> Self {
        Self::new(target_id, MessageKind::Assistant, content)
    }

    pub fn error(target_id: i64, content: impl Into<String>) -> Self {
        Self::new(target_id, MessageKind::Error, content)
    }
}

impl From<&ChatMessage> for ChatTurn {
    fn from(message: &ChatMessage) -> Self {
        match message.kind {
            MessageKind::User => ChatTurn::user(&message.content),
            // Error entries replay as assistant turns so the model sees
            // what the conversation actually contained.
            MessageKind::Assistant | MessageKind::Error => {
                ChatTurn::assistant(&message.content)
            }
        }
    }
}

/// A generation target: the logical application a session belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: i64,
    pub name: String,
    #[serde(rename = "initPrompt")]
    pub init_prompt: String,
    pub layout: CodeLayout,
    #[serde(rename = "ownerId")]
    pub owner_id: i64,
    #[serde(rename = "deployKey", skip_serializing_if = "Option::is_none")]
    pub deploy_key: Option<String>,
    #[serde(rename = "deployedAt", skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,
    #[serde(rename = "coverUrl", skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Target {
    /// Create a new target. The name is the first 12 characters of the
    /// initial prompt.
    pub fn new(init_prompt: impl Into<String>, owner_id: i64, layout: CodeLayout) -> Self {
        let init_prompt = init_prompt.into();
        let name: String = init_prompt.chars().take(12).collect();
        Self {
            id: rand::random::<u32>() as i64,
            name,
            init_prompt,
            layout,
            owner_id,
            deploy_key: None,
            deployed_at: None,
            cover_url: None,
            created_at: Utc::now(),
        }
    }

    /// Output directory name for this target, `<layout>_<id>`.
    pub fn output_dir_name(&self) -> String {
        self.layout.output_dir_name(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagesmith_codegen::TurnRole;

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::user(1, "hello");
        assert_eq!(msg.kind, MessageKind::User);
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.target_id, 1);

        let msg = ChatMessage::error(1, "backend down");
        assert_eq!(msg.kind, MessageKind::Error);
    }

    #[test]
    fn test_message_to_turn() {
        let user_turn: ChatTurn = (&ChatMessage::user(1, "u")).into();
        assert_eq!(user_turn.role, TurnRole::User);

        let error_turn: ChatTurn = (&ChatMessage::error(1, "e")).into();
        assert_eq!(error_turn.role, TurnRole::Assistant);
    }

    #[test]
    fn test_target_name_truncation() {
        let target = Target::new("a landing page for my bakery", 7, CodeLayout::Html);
        assert_eq!(target.name, "a landing pa");
        assert_eq!(target.owner_id, 7);
        assert!(target.deploy_key.is_none());
    }

    #[test]
    fn test_target_name_multibyte_safe() {
        let target = Target::new("みんなのパン屋さんのページ", 1, CodeLayout::Html);
        assert_eq!(target.name.chars().count(), 12);
    }
}
