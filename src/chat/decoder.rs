//! Incremental decoder for the chat endpoint's event stream
//!
//! The endpoint streams newline-delimited SSE fields. Only `data:` lines
//! matter: each carries either a JSON [`Envelope`] or the `[DONE]` sentinel.
//! Everything else (comments, `event:`, `id:`, blank separators) is ignored.
//!
//! Bytes are buffered until a full line is available, so envelopes and
//! multi-byte characters split across network chunks decode correctly.

use bytes::BytesMut;
use serde::Deserialize;

/// Sentinel payload marking the end of the stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded unit from the stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    /// Completion choices; only the first is consulted
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A single completion choice
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Choice {
    /// Incremental update for this choice
    #[serde(default)]
    pub delta: Delta,
}

/// Incremental content update
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Delta {
    /// Text fragment to append, if any
    #[serde(default)]
    pub content: Option<String>,
}

impl Envelope {
    /// The content fragment carried by this envelope, if non-empty
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_chat::chat::decoder::Envelope;
    ///
    /// let envelope: Envelope =
    ///     serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
    /// assert_eq!(envelope.content(), Some("Hi"));
    /// ```
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|content| !content.is_empty())
    }
}

/// Item produced by [`SseDecoder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// A parsed envelope
    Envelope(Envelope),
    /// The end-of-stream sentinel
    Done,
}

/// Incremental line-framing decoder
///
/// # Examples
///
/// ```
/// use folio_chat::chat::decoder::{SseDecoder, StreamItem};
///
/// let mut decoder = SseDecoder::new();
/// assert!(decoder.feed(b"data: {\"choices\":[{\"delta\":").is_empty());
/// let items = decoder.feed(b"{\"content\":\"Hello\"}}]}\n\ndata: [DONE]\n");
/// assert_eq!(items.len(), 2);
/// assert_eq!(items[1], StreamItem::Done);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    done: bool,
}

impl SseDecoder {
    /// Create a decoder with an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the end-of-stream sentinel has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk of bytes and return every complete item it finishes
    ///
    /// Input after the sentinel is discarded.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamItem> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut items = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            if let Some(item) = self.decode_line(&line[..pos]) {
                items.push(item);
                if self.done {
                    self.buffer.clear();
                    break;
                }
            }
        }
        items
    }

    /// Flush a trailing line that was not newline-terminated
    ///
    /// Call once the byte stream has ended.
    pub fn finish(&mut self) -> Vec<StreamItem> {
        if self.done || self.buffer.is_empty() {
            self.buffer.clear();
            return Vec::new();
        }
        let line = self.buffer.split();
        self.decode_line(&line).into_iter().collect()
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<StreamItem> {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim_end_matches('\r'),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping non UTF-8 stream line");
                return None;
            }
        };

        let payload = line.strip_prefix("data:")?.trim();
        if payload.is_empty() {
            return None;
        }
        if payload == DONE_SENTINEL {
            self.done = true;
            return Some(StreamItem::Done);
        }

        match serde_json::from_str::<Envelope>(payload) {
            Ok(envelope) => Some(StreamItem::Envelope(envelope)),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed stream envelope");
                None
            }
        }
    }
}
