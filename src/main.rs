mod config;
mod db;
mod error;
mod llm;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::experiment::{ExperimentStore, PgExperimentStore};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();
    let config = config::AppConfig::from_env().expect("invalid configuration");

    // Missing key is non-fatal: chat requests fail with a configuration error.
    let llm = llm::GeminiClient::new(config.llm.clone()).expect("HTTP client build failed");
    if llm.is_configured() {
        tracing::info!(model = llm.model(), "LLM client initialized");
    } else {
        tracing::warn!("GOOGLE_API_KEY not set; chat requests will fail until it is configured");
    }

    let experiments: Option<Arc<dyn ExperimentStore>> = match config.store.credentials() {
        Some((url, key)) => {
            let pool = db::init_pool(url, key, config.store.max_connections)
                .await
                .expect("database init failed");
            Some(Arc::new(PgExperimentStore::new(pool)))
        }
        None => {
            tracing::warn!(missing = ?config.store.missing(), "experiment store not configured; experiment routes disabled");
            None
        }
    };

    let state = state::AppState::new(Arc::new(llm), experiments).with_session_capacity(config.max_sessions);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "chatrelay listening");
    axum::serve(listener, app).await.expect("server failed");
}
