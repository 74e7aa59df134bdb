//! Gemini `generateContent` client.
//!
//! Thin HTTP wrapper for `/models/{model}:generateContent`. The request body
//! carries one user turn; the reply is the first candidate's first text part.
//! Pure building/parsing in `build_request` and `parse_response` for
//! testability, and the network hop sits behind [`HttpTransport`] so tests can
//! observe exactly when a request would have gone out.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::config::{LlmConfig, LlmTimeouts};
use super::types::{GenerationOptions, LlmError, TextGenerator};

// =============================================================================
// TRANSPORT
// =============================================================================

/// Raw HTTP reply: status code plus undecoded body.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// The single network operation the client needs.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST `body` (already JSON-encoded) to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Request`] if the request could not be completed.
    async fn post_json(&self, url: &str, body: String) -> Result<HttpReply, LlmError>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns [`LlmError::HttpClientBuild`] if the client cannot be built.
    pub fn new(timeouts: LlmTimeouts) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(timeouts.connect_secs));
        if let Some(secs) = timeouts.request_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: String) -> Result<HttpReply, LlmError> {
        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Request(e.without_url().to_string()))?;

        Ok(HttpReply { status, body })
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GeminiClient {
    transport: Arc<dyn HttpTransport>,
    config: LlmConfig,
}

impl GeminiClient {
    /// Build a client that talks to the network through `reqwest`.
    ///
    /// A missing API key is not an error here; it is reported by every
    /// [`TextGenerator::generate`] call instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let transport = ReqwestTransport::new(config.timeouts)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    #[must_use]
    pub fn with_transport(config: LlmConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport, config }
    }

    /// Return the configured default model name (e.g. `"gemini-2.0-flash"`).
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Whether an API key is present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }
}

#[async_trait::async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, text: &str, options: &GenerationOptions) -> Result<String, LlmError> {
        let api_key = self.config.require_api_key()?;
        let model = options.model.as_deref().unwrap_or(&self.config.model);
        let url = endpoint_url(&self.config.base_url, model, api_key);

        let body = serde_json::to_string(&build_request(text, options))
            .map_err(|e| LlmError::Request(format!("encode request: {e}")))?;

        debug!(url = %redact_key(&url), text_len = text.len(), "gemini: generateContent");
        let reply = self.transport.post_json(&url, body).await?;

        if !(200..300).contains(&reply.status) {
            return Err(LlmError::Upstream { status: reply.status, body: reply.body });
        }

        parse_response(&reply.body)
    }
}

fn endpoint_url(base_url: &str, model: &str, api_key: &str) -> String {
    format!("{base_url}/models/{model}:generateContent?key={api_key}")
}

/// Strip the key query parameter so URLs are safe to log.
fn redact_key(url: &str) -> String {
    match url.split_once("key=") {
        Some((head, _)) => format!("{head}key=REDACTED"),
        None => url.to_string(),
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    contents: Vec<ApiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(serde::Serialize)]
struct ApiContent<'a> {
    role: &'a str,
    parts: Vec<ApiPart<'a>>,
}

#[derive(serde::Serialize)]
struct ApiPart<'a> {
    text: &'a str,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(serde::Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(serde::Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(serde::Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// =============================================================================
// BUILDING / PARSING
// =============================================================================

fn build_request<'a>(text: &'a str, options: &GenerationOptions) -> ApiRequest<'a> {
    ApiRequest {
        contents: vec![ApiContent { role: "user", parts: vec![ApiPart { text }] }],
        generation_config: GenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_output_tokens,
        },
    }
}

fn parse_response(json: &str) -> Result<String, LlmError> {
    let api: ApiResponse = serde_json::from_str(json).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    api.candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or_else(|| LlmError::MalformedResponse("no text in first candidate".into()))
}

#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;
