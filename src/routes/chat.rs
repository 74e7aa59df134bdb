//! Chat routes: relay a message, read a session transcript.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::ApiError;
use crate::llm::GenerationOptions;
use crate::services::relay::{self, SendOutcome};
use crate::state::{AppState, Message};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub model: Option<String>,
    /// Continue an existing session; omitted starts a new one.
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub session_id: Uuid,
    pub message_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub messages: Vec<Message>,
    pub busy: bool,
}

/// `POST /api/chat`: relay one user message and return the reply.
///
/// The relay runs on its own task so a client disconnect cannot strand the
/// session in the busy state.
pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(body) = payload?;
    let text = body.message.as_deref().map(str::trim).unwrap_or_default().to_string();
    if text.is_empty() {
        return Err(ApiError::validation("Message is required"));
    }

    let (session_id, conversation) = match body.session_id {
        Some(id) => {
            let conversation = state
                .session(id)
                .await
                .ok_or_else(|| ApiError::not_found(format!("session not found: {id}")))?;
            (id, conversation)
        }
        None => state.open_session().await,
    };

    info!(%session_id, "chat: message received");
    let options = GenerationOptions::default().with_model(body.model);
    let llm = state.llm.clone();
    let task = tokio::spawn(async move { relay::send(&conversation, llm.as_ref(), &text, &options).await });

    let outcome = task.await.map_err(|e| {
        error!(%session_id, error = %e, "chat: relay task failed");
        ApiError::internal("relay task failed")
    })?;

    match outcome {
        Ok(SendOutcome::Replied(message)) => {
            Ok(Json(ChatReply { response: message.content, session_id, message_id: message.id }))
        }
        Ok(SendOutcome::Busy) => {
            Err(ApiError::new(StatusCode::CONFLICT, "E_BUSY", "a reply is already in flight for this session"))
        }
        Ok(SendOutcome::Empty) => Err(ApiError::validation("Message is required")),
        Err(e) => {
            error!(%session_id, error = %e, "chat: relay failed");
            Err(e.into())
        }
    }
}

/// `GET /api/chat/:session_id`: snapshot of a session's transcript.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let conversation = state
        .session(session_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("session not found: {session_id}")))?;

    let snapshot = conversation.lock().await.read();
    Ok(Json(SessionView { session_id, messages: snapshot.messages, busy: snapshot.busy }))
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
