//! Database initialization and migration runner.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup uses this module to create the shared SQLx pool and enforce schema
//! migrations before the experiment routes accept traffic. The store is
//! addressed by a URL plus a separate access key, which is applied as the
//! connection password.

use std::str::FromStr;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::config::parse_var;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Durable store credentials. Both halves are required to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub url: Option<String>,
    pub key: Option<String>,
    pub max_connections: u32,
}

impl StoreConfig {
    /// Read `STORE_URL` (falling back to `DATABASE_URL`), `STORE_KEY`, and
    /// `DB_MAX_CONNECTIONS` through `var`.
    #[must_use]
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            url: non_blank(var("STORE_URL")).or_else(|| non_blank(var("DATABASE_URL"))),
            key: non_blank(var("STORE_KEY")),
            max_connections: parse_var(&var, "DB_MAX_CONNECTIONS").unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        }
    }

    /// `(url, key)` when both are present.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.url.as_deref()?, self.key.as_deref()?))
    }

    /// Names of the variables still needed, empty when fully configured.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.url.is_none() {
            missing.push("STORE_URL");
        }
        if self.key.is_none() {
            missing.push("STORE_KEY");
        }
        missing
    }
}

/// Initialize the `PostgreSQL` connection pool and run migrations.
///
/// # Errors
///
/// Returns an error if the URL is invalid, or the connection or migrations fail.
pub async fn init_pool(url: &str, key: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(url)?.password(key);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
