//! Single-flight streaming chat session
//!
//! A [`ChatSession`] drives one exchange at a time:
//!
//! ```text
//! Idle --send--> Sending --headers--> Streaming --end of stream--> Idle
//!                   |                     |
//!                   +------ error --------+--> Failed --> Idle
//! ```
//!
//! The user message is appended before any network activity. On success the
//! accumulated reply is appended as exactly one assistant message. On failure
//! the user message stays and no assistant message is written.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::backend::{ByteStream, ChatBackend, ChatRequest};
use super::decoder::{SseDecoder, StreamItem};
use crate::conversation::{derive_title, ConversationStore, Message};
use crate::error::{ExchangeError, FolioError, Result};

/// Exchange state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No exchange in flight
    Idle,
    /// Request issued, waiting for response headers
    Sending,
    /// Reading the response body
    Streaming,
    /// The exchange failed; the session returns to `Idle` immediately after
    Failed,
}

/// Progress notifications for a front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Response headers arrived and the body is being decoded
    Started {
        /// Conversation the reply belongs to
        conversation_id: String,
    },
    /// A content fragment was appended to the in-progress reply
    Delta(String),
    /// The reply was finalized and appended to the conversation
    Completed(Message),
    /// The exchange ended without a reply
    Failed(ExchangeError),
}

/// Result of a [`ChatSession::send`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty input or an exchange already in flight; nothing happened
    Ignored,
    /// The assistant reply that was appended
    Completed(Message),
    /// The exchange failed after the user message was appended
    Failed(ExchangeError),
}

struct Inner {
    backend: Arc<dyn ChatBackend>,
    store: Arc<Mutex<ConversationStore>>,
    stream_timeout: Duration,
    state: Mutex<SessionState>,
    streaming: Mutex<String>,
    cancel: Mutex<Option<CancellationToken>>,
    events: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
}

/// Handle to a streaming chat session
///
/// Cloning the handle shares the session; a `send` on any clone while an
/// exchange is in flight is ignored.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Inner>,
}

impl ChatSession {
    /// Create an idle session
    ///
    /// `stream_timeout` bounds the wait for response headers and for each
    /// body chunk.
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        store: Arc<Mutex<ConversationStore>>,
        stream_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                stream_timeout,
                state: Mutex::new(SessionState::Idle),
                streaming: Mutex::new(String::new()),
                cancel: Mutex::new(None),
                events: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to progress events, replacing any previous subscriber
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.inner.events) = Some(tx);
        rx
    }

    /// Shared conversation store
    pub fn store(&self) -> Arc<Mutex<ConversationStore>> {
        Arc::clone(&self.inner.store)
    }

    /// Current exchange state
    pub fn state(&self) -> SessionState {
        *lock(&self.inner.state)
    }

    /// Whether an exchange is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Sending | SessionState::Streaming
        )
    }

    /// Reply text accumulated so far for the in-flight exchange
    pub fn streaming_text(&self) -> String {
        lock(&self.inner.streaming).clone()
    }

    /// Stop the in-flight exchange
    ///
    /// Returns `false` when nothing was in flight. The stopped exchange
    /// resolves to `SendOutcome::Failed(ExchangeError::Cancelled)` and its
    /// partial reply is discarded.
    pub fn stop(&self) -> bool {
        match lock(&self.inner.cancel).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Send a user message to the addressed conversation
    ///
    /// Returns `SendOutcome::Ignored` for blank input or while another
    /// exchange is in flight.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::ConversationNotFound` if the conversation does not
    /// exist. Exchange failures are reported through `SendOutcome::Failed`,
    /// never as errors.
    pub async fn send(&self, conversation_id: &str, text: &str) -> Result<SendOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        {
            let mut state = lock(&self.inner.state);
            if *state != SessionState::Idle {
                tracing::debug!(state = ?*state, "Ignoring send while an exchange is in flight");
                return Ok(SendOutcome::Ignored);
            }
            *state = SessionState::Sending;
        }
        let token = CancellationToken::new();
        *lock(&self.inner.cancel) = Some(token.clone());
        let _reset = ResetOnDrop(self.inner.as_ref());

        let request = {
            let mut store = lock(&self.inner.store);
            let prior = store
                .get(conversation_id)
                .map(|c| c.messages.clone())
                .ok_or_else(|| FolioError::ConversationNotFound(conversation_id.to_string()))?;
            store.append_message(conversation_id, Message::user(text))?;
            ChatRequest::new(text, &prior)
        };

        match self.run_exchange(conversation_id, &request, &token).await {
            Ok(reply) => {
                let message = Message::assistant(reply);
                {
                    let mut store = lock(&self.inner.store);
                    store.append_message(conversation_id, message.clone())?;
                    let untitled = store
                        .get(conversation_id)
                        .map(|c| c.has_default_title())
                        .unwrap_or(false);
                    if untitled {
                        store.update_title(conversation_id, derive_title(text))?;
                    }
                }
                tracing::info!(
                    conversation = %conversation_id,
                    chars = message.content.chars().count(),
                    "Chat exchange completed"
                );
                self.emit(SessionEvent::Completed(message.clone()));
                Ok(SendOutcome::Completed(message))
            }
            Err(error) => {
                *lock(&self.inner.state) = SessionState::Failed;
                tracing::warn!(conversation = %conversation_id, error = %error, "Chat exchange failed");
                self.emit(SessionEvent::Failed(error.clone()));
                Ok(SendOutcome::Failed(error))
            }
        }
    }

    async fn run_exchange(
        &self,
        conversation_id: &str,
        request: &ChatRequest,
        token: &CancellationToken,
    ) -> std::result::Result<String, ExchangeError> {
        let timeout = self.inner.stream_timeout;

        let mut stream: ByteStream = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ExchangeError::Cancelled),
            opened = tokio::time::timeout(timeout, self.inner.backend.open_stream(request)) => {
                opened.map_err(|_| ExchangeError::Timeout(timeout.as_secs()))??
            }
        };

        *lock(&self.inner.state) = SessionState::Streaming;
        self.emit(SessionEvent::Started {
            conversation_id: conversation_id.to_string(),
        });

        let mut decoder = SseDecoder::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ExchangeError::Cancelled),
                next = tokio::time::timeout(timeout, stream.next()) => {
                    next.map_err(|_| ExchangeError::Timeout(timeout.as_secs()))?
                }
            };

            let ended = next.is_none();
            let items = match next {
                Some(chunk) => decoder.feed(&chunk?),
                None => decoder.finish(),
            };
            for item in items {
                if let StreamItem::Envelope(envelope) = item {
                    if let Some(fragment) = envelope.content() {
                        lock(&self.inner.streaming).push_str(fragment);
                        self.emit(SessionEvent::Delta(fragment.to_string()));
                    }
                }
            }

            if ended || decoder.is_done() {
                break;
            }
        }

        Ok(std::mem::take(&mut *lock(&self.inner.streaming)))
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = lock(&self.inner.events).as_ref() {
            let _ = tx.send(event);
        }
    }
}

/// Returns the session to `Idle` however the exchange ends, including when
/// the `send` future is dropped mid-flight.
struct ResetOnDrop<'a>(&'a Inner);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        lock(&self.0.streaming).clear();
        *lock(&self.0.cancel) = None;
        *lock(&self.0.state) = SessionState::Idle;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Role, DEFAULT_TITLE};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn envelope(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    /// Backend that replays fixed chunks or fails outright
    struct ScriptedBackend {
        reply: std::result::Result<Vec<String>, ExchangeError>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn chunks(chunks: Vec<String>) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(chunks),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(error: ExchangeError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(error),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn open_stream(
            &self,
            request: &ChatRequest,
        ) -> std::result::Result<ByteStream, ExchangeError> {
            self.requests.lock().unwrap().push(request.clone());
            let chunks = self.reply.clone()?;
            let items: Vec<std::result::Result<Bytes, ExchangeError>> =
                chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    /// Backend whose body is fed by the test through a channel
    struct ChannelBackend {
        body: Mutex<Option<mpsc::UnboundedReceiver<std::result::Result<Bytes, ExchangeError>>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatBackend for ChannelBackend {
        async fn open_stream(
            &self,
            _request: &ChatRequest,
        ) -> std::result::Result<ByteStream, ExchangeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rx = self
                .body
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| ExchangeError::Transport("body already taken".into()))?;
            let stream = futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            Ok(Box::pin(stream))
        }
    }

    fn channel_backend() -> (
        Arc<ChannelBackend>,
        mpsc::UnboundedSender<std::result::Result<Bytes, ExchangeError>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Arc::new(ChannelBackend {
            body: Mutex::new(Some(rx)),
            calls: AtomicUsize::new(0),
        });
        (backend, tx)
    }

    fn session_with(backend: Arc<dyn ChatBackend>, timeout: Duration) -> (ChatSession, String) {
        let store = ConversationStore::open(Arc::new(MemoryStore::new()));
        let id = store.conversations()[0].id.clone();
        let session = ChatSession::new(backend, Arc::new(Mutex::new(store)), timeout);
        (session, id)
    }

    fn messages(session: &ChatSession, id: &str) -> Vec<(Role, String)> {
        let store = session.store();
        let store = store.lock().unwrap();
        store
            .get(id)
            .unwrap()
            .messages
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect()
    }

    async fn wait_for_state(session: &ChatSession, wanted: SessionState) {
        for _ in 0..200 {
            if session.state() == wanted {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session never reached {:?}", wanted);
    }

    #[tokio::test]
    async fn test_successful_send_appends_user_then_assistant() {
        let backend = ScriptedBackend::chunks(vec![
            envelope("Hi"),
            envelope(" there"),
            "data: [DONE]\n\n".into(),
        ]);
        let (session, id) = session_with(backend, Duration::from_secs(5));

        let outcome = session.send(&id, "hello").await.unwrap();

        match outcome {
            SendOutcome::Completed(message) => assert_eq!(message.content, "Hi there"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(
            messages(&session, &id),
            vec![
                (Role::User, "hello".to_string()),
                (Role::Assistant, "Hi there".to_string())
            ]
        );
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.streaming_text().is_empty());
    }

    #[tokio::test]
    async fn test_reader_close_without_sentinel_completes() {
        let backend = ScriptedBackend::chunks(vec![envelope("no sentinel")]);
        let (session, id) = session_with(backend, Duration::from_secs(5));

        let outcome = session.send(&id, "hello").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Completed(ref m) if m.content == "no sentinel"));
    }

    #[tokio::test]
    async fn test_failure_keeps_only_user_message() {
        let backend = ScriptedBackend::failing(ExchangeError::Transport("refused".into()));
        let (session, id) = session_with(backend, Duration::from_secs(5));

        let outcome = session.send(&id, "hello").await.unwrap();

        assert!(matches!(outcome, SendOutcome::Failed(ExchangeError::Transport(_))));
        assert_eq!(messages(&session, &id), vec![(Role::User, "hello".to_string())]);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_failure_does_not_derive_title() {
        let backend = ScriptedBackend::failing(ExchangeError::RateLimited);
        let (session, id) = session_with(backend, Duration::from_secs(5));

        session.send(&id, "a title candidate").await.unwrap();

        let store = session.store();
        let store = store.lock().unwrap();
        assert_eq!(store.get(&id).unwrap().title, DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let backend = ScriptedBackend::chunks(vec![]);
        let (session, id) = session_with(backend.clone(), Duration::from_secs(5));

        let outcome = session.send(&id, "   \n").await.unwrap();

        assert_eq!(outcome, SendOutcome::Ignored);
        assert!(messages(&session, &id).is_empty());
        assert!(backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_an_error_and_resets_state() {
        let backend = ScriptedBackend::chunks(vec![]);
        let (session, _id) = session_with(backend, Duration::from_secs(5));

        let result = session.send("missing", "hello").await;

        assert!(result.is_err());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_title_derived_from_long_first_message() {
        let backend = ScriptedBackend::chunks(vec![envelope("ok")]);
        let (session, id) = session_with(backend, Duration::from_secs(5));

        session
            .send(&id, "What projects have you built recently that showcase your skills")
            .await
            .unwrap();

        let store = session.store();
        let store = store.lock().unwrap();
        assert_eq!(store.get(&id).unwrap().title, "What projects have you built r...");
    }

    #[tokio::test]
    async fn test_title_kept_for_short_message_and_not_rederived() {
        let backend = ScriptedBackend::chunks(vec![envelope("ok")]);
        let (session, id) = session_with(backend, Duration::from_secs(5));

        session.send(&id, "Show me your resume!").await.unwrap();
        session.send(&id, "And a completely different topic").await.unwrap();

        let store = session.store();
        let store = store.lock().unwrap();
        assert_eq!(store.get(&id).unwrap().title, "Show me your resume!");
    }

    #[tokio::test]
    async fn test_history_excludes_new_message_and_is_bounded() {
        let backend = ScriptedBackend::chunks(vec![envelope("ok")]);
        let (session, id) = session_with(backend.clone(), Duration::from_secs(5));

        for i in 0..6 {
            session.send(&id, &format!("question {}", i)).await.unwrap();
        }

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 6);
        assert!(requests[0].conversation_history.is_empty());
        let last = &requests[5];
        assert_eq!(last.message, "question 5");
        assert_eq!(last.conversation_history.len(), 10);
        assert_eq!(last.conversation_history[0].content, "question 0");
        assert_eq!(last.conversation_history[9].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped() {
        let backend = ScriptedBackend::chunks(vec![
            "data: {\"choices\": [\n".into(),
            envelope("first"),
            envelope(" second"),
            "data: [DONE]\n".into(),
        ]);
        let (session, id) = session_with(backend, Duration::from_secs(5));

        session.send(&id, "hello").await.unwrap();

        assert_eq!(
            messages(&session, &id)[1],
            (Role::Assistant, "first second".to_string())
        );
    }

    #[tokio::test]
    async fn test_second_send_while_streaming_is_ignored() {
        let (backend, body) = channel_backend();
        let (session, id) = session_with(backend.clone(), Duration::from_secs(5));

        let first = {
            let session = session.clone();
            let id = id.clone();
            tokio::spawn(async move { session.send(&id, "first").await })
        };
        wait_for_state(&session, SessionState::Streaming).await;

        let second = session.send(&id, "second").await.unwrap();
        assert_eq!(second, SendOutcome::Ignored);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        body.send(Ok(Bytes::from(envelope("done")))).unwrap();
        drop(body);

        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, SendOutcome::Completed(_)));
        assert_eq!(
            messages(&session, &id),
            vec![
                (Role::User, "first".to_string()),
                (Role::Assistant, "done".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_streaming_text_visible_mid_stream() {
        let (backend, body) = channel_backend();
        let (session, id) = session_with(backend, Duration::from_secs(5));
        let mut events = session.subscribe();

        let task = {
            let session = session.clone();
            let id = id.clone();
            tokio::spawn(async move { session.send(&id, "hello").await })
        };

        body.send(Ok(Bytes::from(envelope("par")))).unwrap();
        assert!(matches!(events.recv().await, Some(SessionEvent::Started { .. })));
        assert_eq!(events.recv().await, Some(SessionEvent::Delta("par".into())));
        assert_eq!(session.streaming_text(), "par");

        body.send(Ok(Bytes::from(envelope("tial")))).unwrap();
        body.send(Ok(Bytes::from("data: [DONE]\n"))).unwrap();

        let outcome = task.await.unwrap().unwrap();
        assert!(matches!(outcome, SendOutcome::Completed(ref m) if m.content == "partial"));
        assert_eq!(events.recv().await, Some(SessionEvent::Delta("tial".into())));
        assert!(matches!(events.recv().await, Some(SessionEvent::Completed(_))));
    }

    #[tokio::test]
    async fn test_stop_cancels_in_flight_exchange() {
        let (backend, body) = channel_backend();
        let (session, id) = session_with(backend, Duration::from_secs(30));

        let task = {
            let session = session.clone();
            let id = id.clone();
            tokio::spawn(async move { session.send(&id, "hello").await })
        };
        body.send(Ok(Bytes::from(envelope("partial")))).unwrap();
        wait_for_state(&session, SessionState::Streaming).await;

        assert!(session.stop());
        let outcome = task.await.unwrap().unwrap();

        assert_eq!(outcome, SendOutcome::Failed(ExchangeError::Cancelled));
        assert_eq!(messages(&session, &id), vec![(Role::User, "hello".to_string())]);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.stop());
        drop(body);
    }

    #[tokio::test]
    async fn test_idle_stream_times_out() {
        let (backend, body) = channel_backend();
        let (session, id) = session_with(backend, Duration::from_millis(50));

        let outcome = session.send(&id, "hello").await.unwrap();

        assert!(matches!(outcome, SendOutcome::Failed(ExchangeError::Timeout(_))));
        assert_eq!(session.state(), SessionState::Idle);
        drop(body);
    }

    #[tokio::test]
    async fn test_mid_stream_error_fails_exchange() {
        let (backend, body) = channel_backend();
        let (session, id) = session_with(backend, Duration::from_secs(5));

        body.send(Ok(Bytes::from(envelope("half")))).unwrap();
        body.send(Err(ExchangeError::Transport("reset".into())))
            .unwrap();

        let outcome = session.send(&id, "hello").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Failed(ExchangeError::Transport(_))));
        assert_eq!(messages(&session, &id).len(), 1);
    }

    #[tokio::test]
    async fn test_session_usable_after_failure() {
        let (session, id) = {
            let backend = ScriptedBackend::failing(ExchangeError::ServiceUnavailable);
            session_with(backend, Duration::from_secs(5))
        };
        let first = session.send(&id, "one").await.unwrap();
        assert!(matches!(first, SendOutcome::Failed(_)));

        let second = session.send(&id, "two").await.unwrap();
        assert!(matches!(second, SendOutcome::Failed(_)));
        assert_eq!(messages(&session, &id).len(), 2);
    }
}
