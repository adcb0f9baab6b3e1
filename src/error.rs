//! Error types for folio-chat
//!
//! This module defines the error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.
//!
//! Two families exist:
//!
//! - [`FolioError`] covers configuration, storage, and addressing failures
//!   that the library reports to its caller.
//! - [`ExchangeError`] classifies why a single chat exchange failed. It is
//!   never propagated as a hard error; the session converts it into a
//!   user-visible notification via [`ExchangeError::user_message`].

use thiserror::Error;

/// Main error type for folio-chat operations
#[derive(Error, Debug)]
pub enum FolioError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// A conversation id did not match any known conversation
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// A conversation id prefix matched more than one conversation
    #[error("Ambiguous conversation id '{prefix}': matches {matches} conversations")]
    AmbiguousConversationId {
        /// The prefix supplied by the caller
        prefix: String,
        /// How many conversations share the prefix
        matches: usize,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why a chat exchange did not produce an assistant message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// The endpoint answered 429 Too Many Requests
    #[error("rate limited by chat endpoint")]
    RateLimited,

    /// The endpoint answered 402 Payment Required
    #[error("chat service unavailable")]
    ServiceUnavailable,

    /// Any other non-success status
    #[error("chat endpoint returned HTTP {status}: {body}")]
    Http {
        /// Numeric HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// The request could not be sent or the body could not be read
    #[error("transport failure: {0}")]
    Transport(String),

    /// No response headers or body chunk arrived within the idle timeout
    #[error("timed out after {0} seconds waiting for the chat endpoint")]
    Timeout(u64),

    /// The exchange was stopped by the caller
    #[error("generation stopped")]
    Cancelled,
}

impl ExchangeError {
    /// Map a non-success HTTP status to its exchange error
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_chat::error::ExchangeError;
    ///
    /// assert_eq!(ExchangeError::from_status(429, String::new()), ExchangeError::RateLimited);
    /// assert_eq!(ExchangeError::from_status(402, String::new()), ExchangeError::ServiceUnavailable);
    /// ```
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => Self::RateLimited,
            402 => Self::ServiceUnavailable,
            _ => Self::Http { status, body },
        }
    }

    /// Text shown to the user when the exchange fails
    ///
    /// Rate-limit and capacity errors get specific wording; every other
    /// failure collapses to a generic message.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RateLimited => "Rate limit exceeded. Please wait a moment and try again.",
            Self::ServiceUnavailable => {
                "The assistant is temporarily unavailable. Please try again later."
            }
            Self::Cancelled => "Generation stopped.",
            Self::Http { .. } | Self::Transport(_) | Self::Timeout(_) => {
                "Failed to get response. Please try again."
            }
        }
    }
}

/// Result type alias for folio-chat operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
