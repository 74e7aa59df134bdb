//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the upstream generator, the optional experiment store, and a
//! registry of live chat sessions. Each session owns exactly one
//! `ConversationStore`: the ordered transcript plus the busy flag that admits
//! one relay call at a time.
//!
//! The registry is capped. Opening a session at capacity evicts the least
//! recently used idle session. A session is idle when no request holds it and
//! no reply is in flight; sessions in use are never evicted.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::llm::TextGenerator;
use crate::services::experiment::{EchoProcessor, ExperimentError, ExperimentProcessor, ExperimentStore};

// =============================================================================
// MESSAGE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), role: Role::User, content: content.into() }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), role: Role::Assistant, content: content.into() }
    }
}

// =============================================================================
// CONVERSATION STORE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user message content is empty")]
    EmptyUserMessage,
}

impl crate::error::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyUserMessage => "E_VALIDATION",
        }
    }
}

/// Point-in-time copy of a conversation. Never aliases the live store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    pub busy: bool,
}

/// Append-only transcript and relay busy flag for one chat session.
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
    busy: bool,
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `message` to the end of the transcript.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyUserMessage`] for a user message whose
    /// content is blank.
    pub fn append(&mut self, message: Message) -> Result<(), StoreError> {
        if message.role == Role::User && message.content.trim().is_empty() {
            return Err(StoreError::EmptyUserMessage);
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    #[must_use]
    pub fn read(&self) -> ConversationSnapshot {
        ConversationSnapshot { messages: self.messages.clone(), busy: self.busy }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

/// A session's store, shared between the handler and its relay task.
pub type SharedConversation = Arc<Mutex<ConversationStore>>;

// =============================================================================
// SESSION REGISTRY
// =============================================================================

pub const DEFAULT_MAX_SESSIONS: usize = 1000;

struct SessionEntry {
    conversation: SharedConversation,
    last_used: u64,
}

impl SessionEntry {
    /// Only the registry holds the store and no reply is pending.
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.conversation) == 1
            && self
                .conversation
                .try_lock()
                .is_ok_and(|store| !store.is_busy())
    }
}

/// Live chat sessions keyed by id, bounded by `capacity`.
pub struct SessionRegistry {
    entries: HashMap<Uuid, SessionEntry>,
    clock: u64,
    capacity: usize,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { entries: HashMap::new(), clock: 0, capacity: capacity.max(1) }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Register a fresh conversation, evicting the least recently used idle
    /// session first when the registry is full.
    pub fn open(&mut self) -> (Uuid, SharedConversation) {
        if self.entries.len() >= self.capacity {
            self.evict_idle();
        }

        let id = Uuid::new_v4();
        let conversation: SharedConversation = Arc::new(Mutex::new(ConversationStore::new()));
        let last_used = self.tick();
        self.entries
            .insert(id, SessionEntry { conversation: conversation.clone(), last_used });
        (id, conversation)
    }

    /// Look up a session and mark it as recently used.
    pub fn get(&mut self, id: Uuid) -> Option<SharedConversation> {
        let now = self.tick();
        let entry = self.entries.get_mut(&id)?;
        entry.last_used = now;
        Some(entry.conversation.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn evict_idle(&mut self) -> Option<Uuid> {
        let victim = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_idle())
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(id, _)| *id)?;
        self.entries.remove(&victim);
        info!(session_id = %victim, capacity = self.capacity, "evicted idle session");
        Some(victim)
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<SessionRegistry>>,
    /// Upstream generator. Always present; an unconfigured key surfaces per call.
    pub llm: Arc<dyn TextGenerator>,
    /// Durable experiment store. `None` if store credentials are not configured.
    pub experiments: Option<Arc<dyn ExperimentStore>>,
    pub processor: Arc<dyn ExperimentProcessor>,
}

impl AppState {
    #[must_use]
    pub fn new(llm: Arc<dyn TextGenerator>, experiments: Option<Arc<dyn ExperimentStore>>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(SessionRegistry::new(DEFAULT_MAX_SESSIONS))),
            llm,
            experiments,
            processor: Arc::new(EchoProcessor),
        }
    }

    /// Replace the session registry with an empty one holding at most
    /// `capacity` sessions.
    #[must_use]
    pub fn with_session_capacity(mut self, capacity: usize) -> Self {
        self.sessions = Arc::new(RwLock::new(SessionRegistry::new(capacity)));
        self
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_processor(mut self, processor: Arc<dyn ExperimentProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Register a fresh, empty conversation and return its id.
    pub async fn open_session(&self) -> (Uuid, SharedConversation) {
        let mut sessions = self.sessions.write().await;
        let (id, conversation) = sessions.open();
        info!(session_id = %id, sessions = sessions.len(), "session opened");
        (id, conversation)
    }

    pub async fn session(&self, id: Uuid) -> Option<SharedConversation> {
        self.sessions.write().await.get(id)
    }

    /// Resolve the experiment store.
    ///
    /// # Errors
    ///
    /// Returns [`ExperimentError::Configuration`] when store credentials were
    /// absent at startup.
    pub fn experiment_store(&self) -> Result<&Arc<dyn ExperimentStore>, ExperimentError> {
        self.experiments
            .as_ref()
            .ok_or_else(|| ExperimentError::Configuration("set STORE_URL and STORE_KEY".into()))
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
