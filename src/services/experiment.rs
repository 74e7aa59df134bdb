//! Experiment service: problem submission, processing, and durable records.
//!
//! DESIGN
//! ======
//! `submit` records the problem as `pending`, hands it to the configured
//! processor, and persists the outcome. Storage sits behind
//! [`ExperimentStore`] so the pipeline can run against Postgres in
//! production and an in-memory table in tests.
//!
//! ERROR HANDLING
//! ==============
//! Once a record exists it always reaches a terminal state before `submit`
//! returns: `completed` with results, or `error`. Status transitions are
//! guarded by `status = 'pending'`, so a record moves out of `pending`
//! exactly once. If the store itself is unreachable after insert, the
//! best-effort `error` transition is logged and the persistence error is
//! returned.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_LIST_LIMIT: i64 = 20;
pub const MAX_LIST_LIMIT: i64 = 100;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("{0}")]
    Validation(String),
    #[error("experiment store not configured: {0}")]
    Configuration(String),
    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("experiment {0} is not pending")]
    NotPending(Uuid),
    #[error("processing failed: {0}")]
    Processing(String),
}

impl crate::error::ErrorCode for ExperimentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E_VALIDATION",
            Self::Configuration(_) => "E_CONFIGURATION",
            Self::Persistence(_) => "E_PERSISTENCE",
            Self::NotPending(_) => "E_NOT_PENDING",
            Self::Processing(_) => "E_PROCESSING",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Pending,
    Completed,
    Error,
}

impl ExperimentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Mirrors the `experiments` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub id: Uuid,
    pub problem: String,
    pub input_data: Option<String>,
    pub status: ExperimentStatus,
    pub results: Option<String>,
    /// Milliseconds since Unix epoch.
    pub created_at: i64,
}

/// Successful `submit` result, shaped for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentOutcome {
    pub status: String,
    pub results: String,
}

// =============================================================================
// STORE
// =============================================================================

#[async_trait::async_trait]
pub trait ExperimentStore: Send + Sync {
    /// Create a record in `pending` state.
    async fn insert_pending(&self, problem: &str, input_data: Option<&str>)
    -> Result<ExperimentRecord, ExperimentError>;

    /// `pending` → `completed` with `results`.
    async fn mark_completed(&self, id: Uuid, results: &str) -> Result<(), ExperimentError>;

    /// `pending` → `error`.
    async fn mark_error(&self, id: Uuid) -> Result<(), ExperimentError>;

    async fn get(&self, id: Uuid) -> Result<Option<ExperimentRecord>, ExperimentError>;

    /// Newest first.
    async fn list(&self, limit: i64) -> Result<Vec<ExperimentRecord>, ExperimentError>;
}

type ExperimentTuple = (Uuid, String, Option<String>, String, Option<String>, i64);

fn record_from_row(row: ExperimentTuple) -> Result<ExperimentRecord, ExperimentError> {
    let (id, problem, input_data, status, results, created_at) = row;
    let status = ExperimentStatus::parse(&status)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown experiment status '{status}'").into()))?;
    Ok(ExperimentRecord { id, problem, input_data, status, results, created_at })
}

fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

/// Postgres-backed store over the `experiments` table.
pub struct PgExperimentStore {
    pool: PgPool,
}

impl PgExperimentStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn transition(
        &self,
        id: Uuid,
        status: ExperimentStatus,
        results: Option<&str>,
    ) -> Result<(), ExperimentError> {
        let done = sqlx::query("UPDATE experiments SET status = $2, results = $3 WHERE id = $1 AND status = 'pending'")
            .bind(id)
            .bind(status.as_str())
            .bind(results)
            .execute(&self.pool)
            .await?;

        if done.rows_affected() == 0 {
            return Err(ExperimentError::NotPending(id));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ExperimentStore for PgExperimentStore {
    async fn insert_pending(
        &self,
        problem: &str,
        input_data: Option<&str>,
    ) -> Result<ExperimentRecord, ExperimentError> {
        let record = ExperimentRecord {
            id: Uuid::new_v4(),
            problem: problem.to_string(),
            input_data: input_data.map(str::to_string),
            status: ExperimentStatus::Pending,
            results: None,
            created_at: now_ms(),
        };

        sqlx::query(
            "INSERT INTO experiments (id, problem, input_data, status, results, created_at) \
             VALUES ($1, $2, $3, $4, NULL, $5)",
        )
        .bind(record.id)
        .bind(&record.problem)
        .bind(record.input_data.as_deref())
        .bind(record.status.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn mark_completed(&self, id: Uuid, results: &str) -> Result<(), ExperimentError> {
        self.transition(id, ExperimentStatus::Completed, Some(results))
            .await
    }

    async fn mark_error(&self, id: Uuid) -> Result<(), ExperimentError> {
        self.transition(id, ExperimentStatus::Error, None).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<ExperimentRecord>, ExperimentError> {
        let row = sqlx::query_as::<_, ExperimentTuple>(
            "SELECT id, problem, input_data, status, results, created_at FROM experiments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn list(&self, limit: i64) -> Result<Vec<ExperimentRecord>, ExperimentError> {
        let rows = sqlx::query_as::<_, ExperimentTuple>(
            "SELECT id, problem, input_data, status, results, created_at \
             FROM experiments ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }
}

// =============================================================================
// PROCESSOR
// =============================================================================

/// The computation step between `pending` and a terminal state.
#[async_trait::async_trait]
pub trait ExperimentProcessor: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ExperimentError::Processing`] if the experiment cannot run.
    async fn process(&self, record: &ExperimentRecord) -> Result<String, ExperimentError>;
}

/// Deterministic placeholder: acknowledges the problem without computing.
pub struct EchoProcessor;

#[async_trait::async_trait]
impl ExperimentProcessor for EchoProcessor {
    async fn process(&self, record: &ExperimentRecord) -> Result<String, ExperimentError> {
        Ok(format!("Processed experiment for problem: {}", record.problem))
    }
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Trim `problem` and reject it when blank.
///
/// # Errors
///
/// Returns [`ExperimentError::Validation`] for blank input.
pub fn validate_problem(problem: &str) -> Result<&str, ExperimentError> {
    let problem = problem.trim();
    if problem.is_empty() {
        return Err(ExperimentError::Validation("problem is required".into()));
    }
    Ok(problem)
}

#[must_use]
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// Record, process, and finalize one experiment.
///
/// # Errors
///
/// Returns a validation error before any I/O, a persistence error if the
/// record cannot be created or finalized, or the processor's error.
pub async fn submit(
    store: &dyn ExperimentStore,
    processor: &dyn ExperimentProcessor,
    problem: &str,
    input_data: Option<&str>,
) -> Result<ExperimentOutcome, ExperimentError> {
    let problem = validate_problem(problem)?;
    let input_data = input_data.filter(|d| !d.trim().is_empty());

    let record = store.insert_pending(problem, input_data).await?;
    info!(id = %record.id, problem_len = problem.len(), "experiment: recorded pending");

    let results = match processor.process(&record).await {
        Ok(results) => results,
        Err(e) => {
            warn!(id = %record.id, error = %e, "experiment: processing failed");
            finalize_error(store, record.id).await;
            return Err(e);
        }
    };

    if let Err(e) = store.mark_completed(record.id, &results).await {
        error!(id = %record.id, error = %e, "experiment: completing record failed");
        finalize_error(store, record.id).await;
        return Err(e);
    }

    info!(id = %record.id, "experiment: completed");
    Ok(ExperimentOutcome { status: "success".into(), results })
}

async fn finalize_error(store: &dyn ExperimentStore, id: Uuid) {
    if let Err(e) = store.mark_error(id).await {
        error!(%id, error = %e, "experiment: marking record as error failed");
    }
}

#[cfg(test)]
#[path = "experiment_test.rs"]
mod tests;
