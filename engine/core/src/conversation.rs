//! Conversation Threads
//!
//! Chat history for agent channels and the guided assistant. Threads are
//! plain serializable values; the session persists them through the store
//! so reconnecting to an agent resumes where it left off.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The person at the terminal
    User,
    /// The agent or assistant
    Assistant,
}

/// A message in a thread
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent this message
    pub role: ChatRole,
    /// Message content
    pub content: String,
    /// When the message was recorded
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Message stamped with the current time
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered chat history with a size cap
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationThread {
    /// Messages, oldest first
    pub messages: Vec<ChatMessage>,
    /// When the thread was opened
    pub created_at: DateTime<Utc>,
    /// Maximum number of messages kept (0 = unlimited)
    #[serde(default)]
    max_messages: usize,
}

impl Default for ConversationThread {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationThread {
    /// Default cap for persisted threads
    pub const DEFAULT_MAX_MESSAGES: usize = 200;

    /// Empty thread with the default cap
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(Self::DEFAULT_MAX_MESSAGES)
    }

    /// Empty thread keeping at most `max_messages` (0 = unlimited)
    #[must_use]
    pub fn with_limit(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            created_at: Utc::now(),
            max_messages,
        }
    }

    /// Record a user message
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::new(ChatRole::User, content));
    }

    /// Record a reply
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::new(ChatRole::Assistant, content));
    }

    /// Append a message, dropping the oldest past the cap
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if self.max_messages > 0 && self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the thread has no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `n` messages, oldest first
    #[must_use]
    pub fn recent(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Transcript of the last `n` messages as `role: content` lines
    #[must_use]
    pub fn transcript(&self, n: usize) -> String {
        self.recent(n)
            .iter()
            .map(|m| {
                let who = match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "agent",
                };
                format!("{who}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Persisted guided assistant progress
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssistantState {
    /// How much the assistant has revealed (0 to 100)
    pub initiation_level: u8,
    /// Topics unlocked so far
    pub unlocked_topics: Vec<String>,
    /// Conversation with the assistant
    pub conversation: ConversationThread,
}

impl AssistantState {
    /// Merge a reply's requested level and topics
    pub fn apply(&mut self, level: Option<u8>, topics: &[String]) {
        if let Some(level) = level {
            self.initiation_level = level.min(100);
        }
        for topic in topics {
            if !self.unlocked_topics.contains(topic) {
                self.unlocked_topics.push(topic.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_thread_caps_messages() {
        let mut thread = ConversationThread::with_limit(3);
        for i in 0..5 {
            thread.push_user(format!("m{i}"));
        }
        let contents: Vec<_> = thread.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_recent_and_transcript() {
        let mut thread = ConversationThread::new();
        assert!(thread.recent(5).is_empty());
        thread.push_user("status?");
        thread.push_assistant("nominal");
        thread.push_user("and now?");

        assert_eq!(thread.recent(2).len(), 2);
        assert_eq!(thread.transcript(2), "agent: nominal\nuser: and now?");
    }

    #[test]
    fn test_thread_serde_roundtrip() {
        let mut thread = ConversationThread::new();
        thread.push_user("hello");
        let json = serde_json::to_string(&thread).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        let back: ConversationThread = serde_json::from_str(&json).unwrap();
        assert_eq!(back, thread);
    }

    #[test]
    fn test_assistant_state_apply() {
        let mut state = AssistantState::default();
        state.apply(Some(130), &["hex".to_string()]);
        state.apply(None, &["hex".to_string(), "bridge".to_string()]);
        assert_eq!(state.initiation_level, 100);
        assert_eq!(state.unlocked_topics, vec!["hex".to_string(), "bridge".to_string()]);
    }
}
