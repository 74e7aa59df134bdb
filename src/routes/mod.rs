//! Router assembly and error rendering.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON HTTP endpoints used by the chat UI under a
//! single Axum router. Handlers translate service errors into `ApiError`,
//! which renders `{ "error", "code", "retryable" }` with a matching status.

pub mod chat;
pub mod experiments;

use axum::Router;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ErrorCode;
use crate::llm::LlmError;
use crate::services::experiment::ExperimentError;
use crate::services::relay::RelayError;
use crate::state::{AppState, StoreError};

// =============================================================================
// ROUTER
// =============================================================================

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat::send_message))
        .route("/api/chat/{session_id}", get(chat::get_session))
        .route("/api/experiment", post(experiments::submit_experiment))
        .route("/api/experiments", get(experiments::list_experiments))
        .route("/api/experiments/{id}", get(experiments::get_experiment))
        .route("/api/status", get(status))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// `GET /api/status`: liveness as reported to the UI.
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse { status: "running".into() })
}

// =============================================================================
// API ERROR
// =============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), retryable: false }
    }

    #[must_use]
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "E_VALIDATION", message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "E_NOT_FOUND", message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "E_INTERNAL", message)
    }

    fn body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.message, "code": self.code, "retryable": self.retryable })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        (self.status, Json(body)).into_response()
    }
}

pub(crate) fn llm_error_to_status(err: &LlmError) -> StatusCode {
    match err {
        LlmError::MissingApiKey { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LlmError::Request(_) | LlmError::Upstream { .. } | LlmError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
        LlmError::HttpClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn experiment_error_to_status(err: &ExperimentError) -> StatusCode {
    match err {
        ExperimentError::Validation(_) => StatusCode::BAD_REQUEST,
        ExperimentError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        ExperimentError::NotPending(_) => StatusCode::CONFLICT,
        ExperimentError::Persistence(_) | ExperimentError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        let status = match &err {
            RelayError::Llm(e) => llm_error_to_status(e),
            RelayError::Store(StoreError::EmptyUserMessage) => StatusCode::BAD_REQUEST,
        };
        // Upstream bodies and key names stay in the logs, not the response.
        let message = match &err {
            RelayError::Llm(LlmError::MissingApiKey { .. }) => "LLM is not configured".to_string(),
            RelayError::Llm(_) => "Failed to generate response. Please try again.".to_string(),
            RelayError::Store(e) => e.to_string(),
        };
        Self::new(status, err.error_code(), message).retryable(err.retryable())
    }
}

// Malformed bodies and query strings get the JSON error shape, not axum's
// plain-text rejection.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<ExperimentError> for ApiError {
    fn from(err: ExperimentError) -> Self {
        Self::new(experiment_error_to_status(&err), err.error_code(), err.to_string()).retryable(err.retryable())
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
