use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::types::{Conversation, Message};
use super::{retention_window, SNAPSHOT_KEY};
use crate::error::{FolioError, Result};
use crate::storage::SnapshotStore;

/// In-memory conversation list synchronized with a snapshot store
///
/// The store never tracks which conversation is "active"; that is front-end
/// state. Storage failures are logged and swallowed so the in-memory list
/// stays authoritative for the current session.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use folio_chat::conversation::{ConversationStore, Message};
/// use folio_chat::storage::MemoryStore;
///
/// # fn main() -> folio_chat::error::Result<()> {
/// let mut store = ConversationStore::open(Arc::new(MemoryStore::new()));
/// let id = store.conversations()[0].id.clone();
/// store.append_message(&id, Message::user("Hi"))?;
/// assert_eq!(store.load()[0].messages.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct ConversationStore {
    port: Arc<dyn SnapshotStore>,
    conversations: Vec<Conversation>,
}

impl ConversationStore {
    /// Open the store, loading the persisted snapshot
    ///
    /// At least one conversation exists afterwards: an empty or unreadable
    /// history yields a single fresh conversation.
    pub fn open(port: Arc<dyn SnapshotStore>) -> Self {
        let mut store = Self {
            port,
            conversations: Vec::new(),
        };
        store.conversations = store.load();
        if store.conversations.is_empty() {
            store.conversations.push(Conversation::new());
        }
        tracing::debug!(
            count = store.conversations.len(),
            "Conversation store initialized"
        );
        store
    }

    /// Read the persisted conversations
    ///
    /// Malformed snapshots degrade to an empty list and malformed records are
    /// skipped. Expired conversations are dropped; when any were dropped the
    /// pruned list is written back.
    pub fn load(&self) -> Vec<Conversation> {
        let raw = match self.port.read(SNAPSHOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read conversation snapshot");
                return Vec::new();
            }
        };

        let parsed = parse_snapshot(&raw);
        let (kept, dropped) = retain_unexpired(parsed, Utc::now());
        if dropped > 0 {
            tracing::info!(dropped, "Purged expired conversations on load");
            self.write_snapshot(&kept);
        }
        kept
    }

    /// Write a full snapshot of `conversations`, minus expired entries
    ///
    /// Write failures are logged, never returned.
    pub fn save(&self, conversations: &[Conversation]) {
        let now = Utc::now();
        let fresh: Vec<Conversation> = conversations
            .iter()
            .filter(|c| !is_expired(c, now))
            .cloned()
            .collect();
        let dropped = conversations.len() - fresh.len();
        if dropped > 0 {
            tracing::info!(dropped, "Purged expired conversations on save");
        }
        self.write_snapshot(&fresh);
    }

    /// All conversations currently held in memory, newest-created first
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Look up a conversation by exact id
    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Resolve a full id or unique id prefix to a full conversation id
    ///
    /// # Errors
    ///
    /// Returns `FolioError::ConversationNotFound` when nothing matches and
    /// `FolioError::AmbiguousConversationId` when the prefix is shared.
    pub fn resolve_id(&self, id_or_prefix: &str) -> Result<String> {
        if let Some(c) = self.get(id_or_prefix) {
            return Ok(c.id.clone());
        }

        let matches: Vec<&Conversation> = self
            .conversations
            .iter()
            .filter(|c| !id_or_prefix.is_empty() && c.id.starts_with(id_or_prefix))
            .collect();

        match matches.as_slice() {
            [only] => Ok(only.id.clone()),
            [] => Err(FolioError::ConversationNotFound(id_or_prefix.to_string()).into()),
            many => Err(FolioError::AmbiguousConversationId {
                prefix: id_or_prefix.to_string(),
                matches: many.len(),
            }
            .into()),
        }
    }

    /// Allocate a new empty conversation
    ///
    /// The conversation is placed first in the in-memory list but is not
    /// persisted until the next mutating operation writes a snapshot.
    pub fn create_conversation(&mut self) -> Conversation {
        let conversation = Conversation::new();
        self.conversations.insert(0, conversation.clone());
        tracing::debug!(id = %conversation.id, "Created conversation");
        conversation
    }

    /// Append a message and bump the conversation's `updated_at`
    pub fn append_message(&mut self, conversation_id: &str, message: Message) -> Result<()> {
        let conversation = self.find_mut(conversation_id)?;
        conversation.messages.push(message);
        conversation.updated_at = Utc::now();
        self.persist();
        Ok(())
    }

    /// Rename a conversation
    pub fn update_title(&mut self, conversation_id: &str, title: impl Into<String>) -> Result<()> {
        let conversation = self.find_mut(conversation_id)?;
        conversation.title = title.into();
        conversation.updated_at = Utc::now();
        self.persist();
        Ok(())
    }

    /// Remove a conversation
    ///
    /// When the removal empties the list a fresh conversation is synthesized.
    /// Returns the id of a remaining conversation the caller can switch to.
    pub fn delete_conversation(&mut self, conversation_id: &str) -> Result<String> {
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == conversation_id)
            .ok_or_else(|| FolioError::ConversationNotFound(conversation_id.to_string()))?;

        self.conversations.remove(index);
        if self.conversations.is_empty() {
            self.conversations.push(Conversation::new());
        }
        self.persist();

        tracing::debug!(id = %conversation_id, "Deleted conversation");
        Ok(self.conversations[0].id.clone())
    }

    /// Empty a conversation's messages without deleting it
    pub fn clear_messages(&mut self, conversation_id: &str) -> Result<()> {
        let conversation = self.find_mut(conversation_id)?;
        conversation.messages.clear();
        conversation.updated_at = Utc::now();
        self.persist();
        Ok(())
    }

    /// Erase the persisted snapshot and start over with one fresh conversation
    ///
    /// Returns the id of the fresh conversation.
    pub fn clear_all(&mut self) -> String {
        if let Err(e) = self.port.remove(SNAPSHOT_KEY) {
            tracing::warn!(error = %e, "Failed to erase conversation snapshot");
        }
        let fresh = Conversation::new();
        let id = fresh.id.clone();
        self.conversations = vec![fresh];
        id
    }

    fn find_mut(&mut self, conversation_id: &str) -> Result<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| FolioError::ConversationNotFound(conversation_id.to_string()).into())
    }

    fn persist(&self) {
        self.save(&self.conversations);
    }

    fn write_snapshot(&self, conversations: &[Conversation]) {
        let json = match serde_json::to_string(conversations) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize conversations");
                return;
            }
        };
        if let Err(e) = self.port.write(SNAPSHOT_KEY, &json) {
            tracing::warn!(error = %e, "Failed to persist conversations");
        }
    }
}

fn is_expired(conversation: &Conversation, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(conversation.updated_at) > retention_window()
}

/// Split off conversations older than the retention window
///
/// Returns the retained conversations and how many were dropped.
pub(crate) fn retain_unexpired(
    conversations: Vec<Conversation>,
    now: DateTime<Utc>,
) -> (Vec<Conversation>, usize) {
    let before = conversations.len();
    let kept: Vec<Conversation> = conversations
        .into_iter()
        .filter(|c| !is_expired(c, now))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Parse a snapshot, skipping records that do not match the current shape
fn parse_snapshot(raw: &str) -> Vec<Conversation> {
    let records: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "Conversation snapshot is malformed; starting empty");
            return Vec::new();
        }
    };

    records
        .into_iter()
        .enumerate()
        .filter_map(
            |(index, record)| match serde_json::from_value::<Conversation>(record) {
                Ok(conversation) => Some(conversation),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping malformed conversation record");
                    None
                }
            },
        )
        .collect()
}
