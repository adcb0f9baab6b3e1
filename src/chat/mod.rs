//! Streaming chat exchange with the assistant endpoint
//!
//! - `decoder`: incremental SSE line decoder producing envelopes
//! - `backend`: the endpoint port and its reqwest implementation
//! - `session`: the single-flight exchange state machine

pub mod backend;
pub mod decoder;
pub mod session;

pub use backend::{ByteStream, ChatBackend, ChatRequest, HistoryEntry, HttpChatBackend, HISTORY_WINDOW};
pub use decoder::{Envelope, SseDecoder, StreamItem};
pub use session::{ChatSession, SendOutcome, SessionEvent, SessionState};
