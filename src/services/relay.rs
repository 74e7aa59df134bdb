//! Relay service: user message in, upstream reply appended to the transcript.
//!
//! DESIGN
//! ======
//! One send is one exchange: append the user message, call the generator
//! with just that utterance, append the reply. The session's busy flag is
//! the only exclusion between sends; the store mutex is held for single
//! mutations and never across the upstream await.
//!
//! ERROR HANDLING
//! ==============
//! Upstream failures propagate to the caller unchanged. The user message
//! stays in the transcript, no assistant message is synthesized, and the
//! busy flag is always cleared.

use tracing::{debug, info, warn};

use crate::llm::{GenerationOptions, LlmError, TextGenerator};
use crate::state::{Message, SharedConversation, StoreError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl crate::error::ErrorCode for RelayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Llm(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Llm(e) if e.retryable())
    }
}

/// What a `send` call did.
#[derive(Debug)]
pub enum SendOutcome {
    /// Blank input; nothing happened.
    Empty,
    /// Another send is in flight on this conversation; nothing happened.
    Busy,
    /// The exchange completed; carries the appended assistant message.
    Replied(Message),
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Relay `user_text` to the generator and record both sides of the exchange.
///
/// # Errors
///
/// Returns [`RelayError::Llm`] when the generator fails. The user message has
/// already been appended at that point; the busy flag has been cleared.
pub async fn send(
    conversation: &SharedConversation,
    llm: &dyn TextGenerator,
    user_text: &str,
    options: &GenerationOptions,
) -> Result<SendOutcome, RelayError> {
    let text = user_text.trim();
    if text.is_empty() {
        debug!("relay: empty input ignored");
        return Ok(SendOutcome::Empty);
    }

    {
        let mut store = conversation.lock().await;
        if store.is_busy() {
            info!(transcript_len = store.len(), "relay: send rejected, reply in flight");
            return Ok(SendOutcome::Busy);
        }
        store.set_busy(true);
        if let Err(e) = store.append(Message::user(text)) {
            store.set_busy(false);
            return Err(e.into());
        }
        info!(transcript_len = store.len(), text_len = text.len(), "relay: user message appended");
    }

    let result = llm.generate(text, options).await;

    let mut store = conversation.lock().await;
    store.set_busy(false);
    match result {
        Ok(reply) => {
            let message = Message::assistant(reply);
            store.append(message.clone())?;
            info!(transcript_len = store.len(), reply_len = message.content.len(), "relay: reply appended");
            Ok(SendOutcome::Replied(message))
        }
        Err(e) => {
            warn!(error = %e, "relay: upstream call failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
