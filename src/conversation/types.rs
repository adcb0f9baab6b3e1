use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DEFAULT_TITLE;

/// Author of a message
///
/// Only user and assistant turns are persisted; system prompts live on the
/// chat endpoint side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the visitor
    User,
    /// Text produced by the assistant
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in a conversation
///
/// Messages are immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier
    pub id: String,
    /// Who wrote the message
    pub role: Role,
    /// Full text content
    pub content: String,
    /// When the message was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_chat::conversation::{Message, Role};
    ///
    /// let msg = Message::user("Hello!");
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.content, "Hello!");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

/// A titled, ordered sequence of messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique identifier
    pub id: String,
    /// Human-readable label
    pub title: String,
    /// Messages in chronological order
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Last mutation time, drives retention
    pub updated_at: DateTime<Utc>,
    /// Creation time; older snapshots may not carry it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Creates an empty conversation with the placeholder title
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_chat::conversation::{Conversation, DEFAULT_TITLE};
    ///
    /// let conversation = Conversation::new();
    /// assert_eq!(conversation.title, DEFAULT_TITLE);
    /// assert!(conversation.messages.is_empty());
    /// ```
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            updated_at: now,
            created_at: Some(now),
        }
    }

    /// Whether the title is still the placeholder
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    /// Short listing view of the conversation
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at.unwrap_or(self.updated_at),
            updated_at: self.updated_at,
            message_count: self.messages.len(),
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata for a stored conversation, without its messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Unique identifier for the conversation
    pub id: String,
    /// User-friendly title
    pub title: String,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the conversation was last updated
    pub updated_at: DateTime<Utc>,
    /// Number of messages in the conversation
    pub message_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_system_role_is_rejected() {
        let parsed = serde_json::from_str::<Role>("\"system\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_conversation_uses_camel_case_fields() {
        let conversation = Conversation::new();
        let value = serde_json::to_value(&conversation).unwrap();
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("updated_at").is_none());
    }

    #[test]
    fn test_conversation_without_created_at_parses() {
        let raw = r#"{
            "id": "c1",
            "title": "Old",
            "messages": [{"id": "m1", "role": "user", "content": "hi"}],
            "updatedAt": "2026-10-01T12:00:00Z"
        }"#;
        let conversation: Conversation = serde_json::from_str(raw).unwrap();
        assert!(conversation.created_at.is_none());
        assert_eq!(conversation.messages[0].timestamp, None);
        assert_eq!(conversation.summary().created_at, conversation.updated_at);
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::user("a");
        let b = Message::user("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_summary_counts_messages() {
        let mut conversation = Conversation::new();
        conversation.messages.push(Message::user("q"));
        conversation.messages.push(Message::assistant("a"));
        let summary = conversation.summary();
        assert_eq!(summary.message_count, 2);
        assert_eq!(summary.id, conversation.id);
    }
}
