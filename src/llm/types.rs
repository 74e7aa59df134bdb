//! LLM types: generation options, errors, and the generator trait.
//!
//! Provider-neutral: the relay only ever sees [`TextGenerator`], so the
//! Gemini client can be swapped for a stub in tests.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1000;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The API key is not configured. Raised before any network activity.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// The HTTP request to the provider could not be completed.
    #[error("API request failed: {0}")]
    Request(String),

    /// The provider returned a non-success HTTP status.
    #[error("upstream error: status {status}")]
    Upstream { status: u16, body: String },

    /// Success status, but the body did not contain a candidate text.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::error::ErrorCode for LlmError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingApiKey { .. } => "E_CONFIGURATION",
            Self::Request(_) => "E_API_REQUEST",
            Self::Upstream { .. } => "E_UPSTREAM",
            Self::MalformedResponse(_) => "E_MALFORMED_RESPONSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Upstream { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Per-call generation knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling randomness.
    pub temperature: f32,
    /// Response length cap.
    pub max_output_tokens: u32,
    /// Overrides the client's configured model for this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: DEFAULT_TEMPERATURE, max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS, model: None }
    }
}

impl GenerationOptions {
    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.trim().is_empty());
        self
    }
}

// =============================================================================
// TEXT GENERATOR TRAIT
// =============================================================================

/// Provider-neutral async trait for single-turn text generation. Enables
/// mocking in tests.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send `text` as a single user turn and return the provider's reply.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the API key is absent, the request fails,
    /// the provider answers with a non-2xx status, or the body is malformed.
    async fn generate(&self, text: &str, options: &GenerationOptions) -> Result<String, LlmError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
