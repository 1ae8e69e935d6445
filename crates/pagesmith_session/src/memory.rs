//! Bounded conversation memory.

use std::collections::VecDeque;

use crate::types::ChatMessage;

/// A window over the most recent conversation entries, capped at a fixed
/// number of messages. Pushing beyond the cap drops the oldest entry.
#[derive(Debug)]
pub struct MemoryWindow {
    max_messages: usize,
    entries: VecDeque<ChatMessage>,
}

impl MemoryWindow {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            entries: VecDeque::with_capacity(max_messages),
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        if self.entries.len() == self.max_messages {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    /// Clear the window, then load the given messages oldest-first.
    /// Clearing first prevents duplication when a session is replayed more
    /// than once.
    pub fn replace_all(&mut self, messages: Vec<ChatMessage>) {
        self.entries.clear();
        for message in messages {
            self.push(message);
        }
    }

    /// Ordered copy of the window contents, oldest first.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
