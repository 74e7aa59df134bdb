use super::*;

#[test]
fn conversation_store_new_is_empty_and_idle() {
    let store = ConversationStore::new();
    assert_eq!(store.len(), 0);
    assert!(!store.is_busy());
    let snap = store.read();
    assert!(snap.messages.is_empty());
    assert!(!snap.busy);
}

#[test]
fn append_then_read_preserves_order_and_identity() {
    let mut store = ConversationStore::new();
    let sent: Vec<Message> = (0..5)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("question {i}"))
            } else {
                Message::assistant(format!("answer {i}"))
            }
        })
        .collect();

    for msg in &sent {
        store.append(msg.clone()).unwrap();
    }

    let snap = store.read();
    assert_eq!(snap.messages, sent);
    assert_eq!(store.len(), 5);
}

#[test]
fn append_rejects_blank_user_message() {
    let mut store = ConversationStore::new();
    let err = store.append(Message::user("   ")).unwrap_err();
    assert!(matches!(err, StoreError::EmptyUserMessage));
    assert_eq!(store.len(), 0);
}

#[test]
fn append_accepts_empty_assistant_message() {
    let mut store = ConversationStore::new();
    store.append(Message::assistant("")).unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn read_returns_detached_snapshot() {
    let mut store = ConversationStore::new();
    store.append(Message::user("hi")).unwrap();
    let mut snap = store.read();
    snap.messages.clear();
    snap.busy = true;
    assert_eq!(store.len(), 1);
    assert!(!store.is_busy());
}

#[test]
fn set_busy_toggles_flag() {
    let mut store = ConversationStore::new();
    store.set_busy(true);
    assert!(store.is_busy());
    assert!(store.read().busy);
    store.set_busy(false);
    assert!(!store.is_busy());
}

#[test]
fn message_ids_are_unique() {
    let ids: std::collections::HashSet<Uuid> = (0..100).map(|_| Message::user("x").id).collect();
    assert_eq!(ids.len(), 100);
}

#[test]
fn message_role_serializes_lowercase() {
    let msg = Message::assistant("hello");
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["role"], "assistant");
    assert_eq!(json["content"], "hello");
    let restored: Message = serde_json::from_value(json).unwrap();
    assert_eq!(restored, msg);
}

// =============================================================================
// AppState sessions
// =============================================================================

#[tokio::test]
async fn open_session_registers_empty_conversation() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(test_helpers::MockGenerator::new(Vec::new())));
    let (id, conversation) = state.open_session().await;

    let found = state.session(id).await.unwrap();
    assert!(Arc::ptr_eq(&found, &conversation));
    assert_eq!(found.lock().await.len(), 0);
}

#[tokio::test]
async fn sessions_are_isolated() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(test_helpers::MockGenerator::new(Vec::new())));
    let (a, conv_a) = state.open_session().await;
    let (b, _) = state.open_session().await;
    assert_ne!(a, b);

    conv_a.lock().await.append(Message::user("only in a")).unwrap();
    assert_eq!(state.session(a).await.unwrap().lock().await.len(), 1);
    assert_eq!(state.session(b).await.unwrap().lock().await.len(), 0);
}

#[tokio::test]
async fn unknown_session_is_none() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(test_helpers::MockGenerator::new(Vec::new())));
    assert!(state.session(Uuid::new_v4()).await.is_none());
}

#[test]
fn experiment_store_missing_is_configuration_error() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(test_helpers::MockGenerator::new(Vec::new())));
    let err = state.experiment_store().err().unwrap();
    assert!(matches!(err, ExperimentError::Configuration(_)));
}

// =============================================================================
// SessionRegistry bounds
// =============================================================================

#[test]
fn registry_at_capacity_evicts_least_recently_used() {
    let mut registry = SessionRegistry::new(2);
    let (first, _) = registry.open();
    let (second, _) = registry.open();

    // Touching `first` leaves `second` as the oldest.
    assert!(registry.get(first).is_some());
    let (third, _) = registry.open();

    assert_eq!(registry.len(), 2);
    assert!(registry.get(first).is_some());
    assert!(registry.get(second).is_none());
    assert!(registry.get(third).is_some());
}

#[test]
fn registry_stays_bounded_under_many_opens() {
    let mut registry = SessionRegistry::new(10);
    for _ in 0..1000 {
        registry.open();
    }
    assert_eq!(registry.len(), 10);
}

#[test]
fn registry_never_evicts_held_session() {
    let mut registry = SessionRegistry::new(1);
    let (held_id, held) = registry.open();

    let (fresh, _) = registry.open();
    assert_eq!(registry.len(), 2);

    // Once released, `held` is the oldest idle session.
    drop(held);
    registry.open();
    assert_eq!(registry.len(), 2);
    assert!(registry.get(held_id).is_none());
    assert!(registry.get(fresh).is_some());
}

#[test]
fn registry_never_evicts_busy_session() {
    let mut registry = SessionRegistry::new(1);
    let (busy_id, conversation) = registry.open();
    conversation.try_lock().unwrap().set_busy(true);
    drop(conversation);

    registry.open();
    assert!(registry.get(busy_id).is_some());
}

#[tokio::test]
async fn app_state_session_capacity_applies() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(test_helpers::MockGenerator::new(Vec::new())))
        .with_session_capacity(3);
    for _ in 0..20 {
        state.open_session().await;
    }
    assert_eq!(state.sessions.read().await.len(), 3);
}
