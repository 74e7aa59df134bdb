//! Process configuration, resolved once at startup and injected.
//!
//! Credentials are optional at startup. A missing API key or store credential
//! makes the matching feature fail with a configuration error at call time;
//! the process still starts.
//!
//! `PORT` must parse. Other numeric tuning values fall back to their default
//! with a warning when they do not.

use std::str::FromStr;

use tracing::warn;

use crate::db::StoreConfig;
use crate::llm::config::LlmConfig;
use crate::state::DEFAULT_MAX_SESSIONS;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid PORT: {0}")]
    InvalidPort(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// Live chat sessions kept in memory before idle ones are evicted.
    pub max_sessions: usize,
    pub llm: LlmConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Read the process environment. `main` loads `.env` beforehand.
    ///
    /// # Errors
    ///
    /// Returns an error if a present value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPort`] if `PORT` is not a valid port.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match var("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            max_sessions: parse_var(&var, "MAX_SESSIONS").unwrap_or(DEFAULT_MAX_SESSIONS),
            llm: LlmConfig::from_vars(&var),
            store: StoreConfig::from_vars(&var),
        })
    }
}

/// Parse an optional tuning value. Blank counts as unset; an unparseable
/// value is logged and treated as unset.
pub(crate) fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable config value; using default");
            None
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
