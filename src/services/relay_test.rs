use std::sync::Arc;

use tokio::sync::Mutex;

use super::*;
use crate::llm::GeminiClient;
use crate::llm::config::{DEFAULT_GEMINI_BASE_URL, LlmConfig, LlmTimeouts};
use crate::state::test_helpers::{CountingTransport, GatedGenerator, MockGenerator, candidate_json};
use crate::state::{ConversationStore, Role};

fn conversation() -> SharedConversation {
    Arc::new(Mutex::new(ConversationStore::new()))
}

fn gemini(api_key: Option<&str>, transport: Arc<CountingTransport>) -> GeminiClient {
    let config = LlmConfig {
        api_key: api_key.map(str::to_string),
        model: "gemini-2.0-flash".into(),
        base_url: DEFAULT_GEMINI_BASE_URL.into(),
        timeouts: LlmTimeouts { request_secs: None, connect_secs: 10 },
    };
    GeminiClient::with_transport(config, transport)
}

fn transcript(conv: &ConversationStore) -> Vec<(Role, String)> {
    conv.read()
        .messages
        .into_iter()
        .map(|m| (m.role, m.content))
        .collect()
}

// =========================================================================
// happy path
// =========================================================================

#[tokio::test]
async fn send_appends_user_then_assistant() {
    let conv = conversation();
    let transport = Arc::new(CountingTransport::ok(candidate_json("X")));
    let llm = gemini(Some("k"), transport);

    let outcome = send(&conv, &llm, "hi", &GenerationOptions::default())
        .await
        .unwrap();
    assert!(matches!(&outcome, SendOutcome::Replied(m) if m.content == "X" && m.role == Role::Assistant));

    let store = conv.lock().await;
    assert_eq!(transcript(&store), vec![(Role::User, "hi".into()), (Role::Assistant, "X".into())]);
    assert!(!store.is_busy());
}

#[tokio::test]
async fn send_forwards_only_trimmed_latest_utterance() {
    let conv = conversation();
    let llm = MockGenerator::new(vec![Ok("one".into()), Ok("two".into())]);

    send(&conv, &llm, "  first  ", &GenerationOptions::default())
        .await
        .unwrap();
    send(&conv, &llm, "second", &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(llm.prompts(), vec!["first".to_string(), "second".to_string()]);
    let store = conv.lock().await;
    assert_eq!(store.read().messages[0].content, "first");
    assert_eq!(store.len(), 4);
}

#[tokio::test]
async fn identical_sends_produce_independent_exchanges() {
    let conv = conversation();
    let llm = MockGenerator::new(Vec::new());

    send(&conv, &llm, "same", &GenerationOptions::default())
        .await
        .unwrap();
    send(&conv, &llm, "same", &GenerationOptions::default())
        .await
        .unwrap();

    let snap = conv.lock().await.read();
    assert_eq!(snap.messages.len(), 4);
    assert_ne!(snap.messages[0].id, snap.messages[2].id);
}

// =========================================================================
// no-op paths
// =========================================================================

#[tokio::test]
async fn empty_input_is_noop() {
    let conv = conversation();
    let llm = MockGenerator::new(Vec::new());

    let outcome = send(&conv, &llm, "   \n\t", &GenerationOptions::default())
        .await
        .unwrap();
    assert!(matches!(outcome, SendOutcome::Empty));
    assert_eq!(conv.lock().await.len(), 0);
    assert!(llm.prompts().is_empty());
}

#[tokio::test]
async fn busy_conversation_rejects_second_send() {
    let conv = conversation();
    conv.lock().await.set_busy(true);
    let llm = MockGenerator::new(Vec::new());

    let outcome = send(&conv, &llm, "hi", &GenerationOptions::default())
        .await
        .unwrap();
    assert!(matches!(outcome, SendOutcome::Busy));
    assert_eq!(conv.lock().await.len(), 0);
    assert!(llm.prompts().is_empty());
}

#[tokio::test]
async fn user_message_lands_before_upstream_call_and_blocks_concurrent_send() {
    let conv = conversation();
    let gated = Arc::new(GatedGenerator::new("late reply"));

    let task = {
        let conv = conv.clone();
        let gated = gated.clone();
        tokio::spawn(async move { send(&conv, gated.as_ref(), "first", &GenerationOptions::default()).await })
    };

    gated.started.notified().await;
    {
        let store = conv.lock().await;
        assert!(store.is_busy());
        assert_eq!(transcript(&store), vec![(Role::User, "first".into())]);
    }

    let other = MockGenerator::new(Vec::new());
    let outcome = send(&conv, &other, "second", &GenerationOptions::default())
        .await
        .unwrap();
    assert!(matches!(outcome, SendOutcome::Busy));
    assert_eq!(conv.lock().await.len(), 1);

    gated.release.notify_one();
    let outcome = task.await.unwrap().unwrap();
    assert!(matches!(outcome, SendOutcome::Replied(_)));

    let store = conv.lock().await;
    assert_eq!(transcript(&store), vec![(Role::User, "first".into()), (Role::Assistant, "late reply".into())]);
    assert!(!store.is_busy());
}

// =========================================================================
// failure paths
// =========================================================================

#[tokio::test]
async fn upstream_500_keeps_only_user_message() {
    let conv = conversation();
    let transport = Arc::new(CountingTransport::status(500, "oops"));
    let llm = gemini(Some("k"), transport);

    let err = send(&conv, &llm, "hi", &GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Llm(LlmError::Upstream { status: 500, .. })));

    let store = conv.lock().await;
    assert_eq!(transcript(&store), vec![(Role::User, "hi".into())]);
    assert!(!store.is_busy());
}

#[tokio::test]
async fn missing_key_surfaces_configuration_error_without_network() {
    let conv = conversation();
    let transport = Arc::new(CountingTransport::ok(candidate_json("unused")));
    let llm = gemini(None, transport.clone());

    let err = send(&conv, &llm, "hi", &GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Llm(LlmError::MissingApiKey { .. })));
    assert_eq!(transport.calls(), 0);
    assert!(!conv.lock().await.is_busy());
}

#[tokio::test]
async fn conversation_recovers_after_failure() {
    let conv = conversation();
    let llm = MockGenerator::new(vec![Err(LlmError::Request("reset".into())), Ok("better".into())]);

    assert!(send(&conv, &llm, "a", &GenerationOptions::default()).await.is_err());
    let outcome = send(&conv, &llm, "b", &GenerationOptions::default())
        .await
        .unwrap();
    assert!(matches!(outcome, SendOutcome::Replied(m) if m.content == "better"));

    let store = conv.lock().await;
    assert_eq!(
        transcript(&store),
        vec![(Role::User, "a".into()), (Role::User, "b".into()), (Role::Assistant, "better".into())]
    );
}

#[test]
fn relay_error_codes_delegate() {
    use crate::error::ErrorCode;
    let err = RelayError::Llm(LlmError::Upstream { status: 503, body: String::new() });
    assert_eq!(err.error_code(), "E_UPSTREAM");
    assert!(err.retryable());
    let err = RelayError::Store(StoreError::EmptyUserMessage);
    assert_eq!(err.error_code(), "E_VALIDATION");
    assert!(!err.retryable());
}
