//! Conversation model and persisted conversation store
//!
//! This module owns the data model (conversations and their messages) and
//! the [`ConversationStore`], which keeps the in-memory list synchronized
//! with a [`SnapshotStore`](crate::storage::SnapshotStore) and enforces the
//! retention window.

pub mod store;
pub mod types;

pub use store::ConversationStore;
pub use types::{Conversation, ConversationSummary, Message, Role};

use chrono::Duration;

/// Placeholder title of a conversation that has not been named yet
pub const DEFAULT_TITLE: &str = "New Chat";

/// Maximum number of characters kept when deriving a title
pub const TITLE_MAX_CHARS: usize = 30;

/// Suffix appended to a derived title that was truncated
pub const TITLE_TRUNCATION_MARKER: &str = "...";

/// Key the conversation snapshot is stored under
pub const SNAPSHOT_KEY: &str = "chat-conversations";

/// Number of days a conversation is kept after its last update
pub const RETENTION_DAYS: i64 = 30;

/// Retention window as a duration
pub fn retention_window() -> Duration {
    Duration::days(RETENTION_DAYS)
}

/// Derive a conversation title from the first user message
///
/// Keeps the first 30 characters (not bytes) and appends `...` when the
/// message was longer.
///
/// # Examples
///
/// ```
/// use folio_chat::conversation::derive_title;
///
/// assert_eq!(derive_title("Tell me about your work"), "Tell me about your work");
/// assert_eq!(
///     derive_title("What projects have you built recently that showcase your skills"),
///     "What projects have you built r..."
/// );
/// ```
pub fn derive_title(message: &str) -> String {
    let message = message.trim();
    if message.chars().count() > TITLE_MAX_CHARS {
        let head: String = message.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}{}", head, TITLE_TRUNCATION_MARKER)
    } else {
        message.to_string()
    }
}
