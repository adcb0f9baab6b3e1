use std::sync::Arc;
use tempfile::TempDir;

use folio_chat::conversation::ConversationStore;
use folio_chat::storage::SledStore;

#[allow(dead_code)]
pub fn create_temp_sled() -> (Arc<SledStore>, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store = SledStore::open(tmp.path().join("history.sled")).expect("failed to open sled store");
    (Arc::new(store), tmp)
}

#[allow(dead_code)]
pub fn create_temp_store() -> (ConversationStore, TempDir) {
    let (port, tmp) = create_temp_sled();
    (ConversationStore::open(port), tmp)
}

/// One SSE line carrying a content delta
#[allow(dead_code)]
pub fn sse_delta(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [{"delta": {"content": content}}]})
    )
}

/// A complete SSE body: one delta per fragment, then the end sentinel
#[allow(dead_code)]
pub fn sse_body(fragments: &[&str]) -> String {
    let mut body: String = fragments.iter().map(|f| sse_delta(f)).collect();
    body.push_str("data: [DONE]\n\n");
    body
}
