//! Chat endpoint port and its HTTP implementation
//!
//! [`ChatBackend`] opens a token stream for a [`ChatRequest`]. The session
//! only sees a stream of byte chunks; status handling and authentication live
//! here.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::config::ChatConfig;
use crate::conversation::{Message, Role};
use crate::error::{ExchangeError, FolioError, Result};

/// Number of prior messages sent along with a new user message
pub const HISTORY_WINDOW: usize = 10;

/// Body chunks of a streaming response
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, ExchangeError>> + Send>>;

/// One prior turn sent to the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Author of the turn
    pub role: Role,
    /// Turn text
    pub content: String,
}

/// Request body accepted by the chat endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The new user message
    pub message: String,
    /// The most recent prior turns, oldest first
    pub conversation_history: Vec<HistoryEntry>,
}

impl ChatRequest {
    /// Build a request from a new message and the conversation's prior turns
    ///
    /// Only the last [`HISTORY_WINDOW`] prior messages are included.
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_chat::chat::ChatRequest;
    /// use folio_chat::conversation::Message;
    ///
    /// let prior: Vec<Message> = (0..12).map(|i| Message::user(i.to_string())).collect();
    /// let request = ChatRequest::new("next", &prior);
    /// assert_eq!(request.conversation_history.len(), 10);
    /// assert_eq!(request.conversation_history[0].content, "2");
    /// ```
    pub fn new(message: impl Into<String>, prior: &[Message]) -> Self {
        let start = prior.len().saturating_sub(HISTORY_WINDOW);
        Self {
            message: message.into(),
            conversation_history: prior[start..]
                .iter()
                .map(|m| HistoryEntry {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
        }
    }
}

/// Remote collaborator that turns a chat request into a token stream
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the request and return the response body as a byte stream
    ///
    /// Resolves once response headers are received. A non-success status
    /// resolves to the matching [`ExchangeError`].
    async fn open_stream(
        &self,
        request: &ChatRequest,
    ) -> std::result::Result<ByteStream, ExchangeError>;
}

/// [`ChatBackend`] that POSTs to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    client: reqwest::Client,
    endpoint: url::Url,
    api_key: Option<String>,
}

impl HttpChatBackend {
    /// Construct a backend from the chat configuration
    ///
    /// No network I/O is performed at construction time. Only the connect
    /// phase carries a client-level timeout; the session bounds header and
    /// chunk waits itself so long replies are not cut off.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::Config` if the endpoint is not a valid URL and
    /// `FolioError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let endpoint = url::Url::parse(&config.endpoint).map_err(|e| {
            FolioError::Config(format!("Invalid chat endpoint '{}': {}", config.endpoint, e))
        })?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(FolioError::Http)?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    /// Endpoint requests are sent to
    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn open_stream(
        &self,
        request: &ChatRequest,
    ) -> std::result::Result<ByteStream, ExchangeError> {
        let mut req = self
            .client
            .post(self.endpoint.as_str())
            .header("Accept", "text/event-stream")
            .json(request);

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            history = request.conversation_history.len(),
            "Sending chat request"
        );

        let response = req
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(format!("HTTP POST failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Chat endpoint returned an error status");
            return Err(ExchangeError::from_status(status.as_u16(), body));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ExchangeError::Transport(e.to_string())));
        Ok(Box::pin(stream))
    }
}
