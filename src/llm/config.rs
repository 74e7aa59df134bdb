//! LLM configuration parsed from environment variables.

use super::types::LlmError;
use crate::config::parse_var;

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_LLM_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmTimeouts {
    /// Whole-request timeout. `None` leaves the call unbounded.
    pub request_secs: Option<u64>,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    /// Absent keys are carried as `None` and rejected at call time.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeouts: LlmTimeouts,
}

impl LlmConfig {
    /// Build typed LLM config from a variable lookup.
    ///
    /// Optional:
    /// - `GOOGLE_API_KEY`: provider key; missing means every call fails fast
    /// - `LLM_MODEL`: default `gemini-2.0-flash`
    /// - `LLM_BASE_URL`: default Generative Language v1beta endpoint
    /// - `LLM_REQUEST_TIMEOUT_SECS`: unset by default
    /// - `LLM_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// Unparseable timeouts are logged and fall back to their defaults.
    #[must_use]
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = var(API_KEY_VAR).filter(|k| !k.trim().is_empty());
        let model = var("LLM_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let base_url = var("LLM_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let timeouts = LlmTimeouts {
            request_secs: parse_var(&var, "LLM_REQUEST_TIMEOUT_SECS"),
            connect_secs: parse_var(&var, "LLM_CONNECT_TIMEOUT_SECS").unwrap_or(DEFAULT_LLM_CONNECT_TIMEOUT_SECS),
        };

        Self { api_key, model, base_url, timeouts }
    }

    /// Return the API key or the configuration error naming its variable.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingApiKey`] when no key is configured.
    pub fn require_api_key(&self) -> Result<&str, LlmError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LlmError::MissingApiKey { var: API_KEY_VAR.into() })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
