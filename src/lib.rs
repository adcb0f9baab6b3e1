//! folio-chat - portfolio AI assistant library
//!
//! This library provides the core of the portfolio chat assistant:
//! durable conversation history with a 30-day retention window, and a
//! streaming chat session that talks to the assistant endpoint over
//! server-sent events.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `conversation`: Conversation types and the `ConversationStore`
//! - `storage`: Key-value persistence port with sled and in-memory backends
//! - `chat`: SSE decoding, the HTTP backend, and the `ChatSession` state machine
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: Handlers invoked by the CLI
//!
//! # Example
//!
//! ```no_run
//! use folio_chat::{ChatSession, Config, ConversationStore, HttpChatBackend};
//! use folio_chat::storage::MemoryStore;
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let store = ConversationStore::open(Arc::new(MemoryStore::new()));
//!     let conversation_id = store.conversations()[0].id.clone();
//!     let session = ChatSession::new(
//!         Arc::new(HttpChatBackend::new(&config.chat)?),
//!         Arc::new(Mutex::new(store)),
//!         Duration::from_secs(config.chat.stream_timeout_seconds),
//!     );
//!     session.send(&conversation_id, "What have you built?").await?;
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use chat::{ChatBackend, ChatSession, HttpChatBackend, SendOutcome, SessionEvent, SessionState};
pub use config::Config;
pub use conversation::{Conversation, ConversationStore, Message, Role};
pub use error::{ExchangeError, FolioError, Result};
