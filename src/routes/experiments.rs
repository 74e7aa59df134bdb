//! Experiment routes: submit, fetch, and list experiment records.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use super::ApiError;
use crate::services::experiment::{self, ExperimentOutcome, ExperimentRecord};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitExperimentBody {
    #[serde(default)]
    pub problem: String,
    pub input_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

/// Submit failures keep the `{status, error}` shape the UI reads.
#[derive(Debug)]
pub struct SubmitError(pub ApiError);

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": "error",
            "error": self.0.message,
            "code": self.0.code,
            "retryable": self.0.retryable,
        });
        (self.0.status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for SubmitError {
    fn from(rejection: JsonRejection) -> Self {
        Self(rejection.into())
    }
}

impl From<experiment::ExperimentError> for SubmitError {
    fn from(err: experiment::ExperimentError) -> Self {
        Self(err.into())
    }
}

/// `POST /api/experiment`: record and process a problem.
pub async fn submit_experiment(
    State(state): State<AppState>,
    payload: Result<Json<SubmitExperimentBody>, JsonRejection>,
) -> Result<Json<ExperimentOutcome>, SubmitError> {
    let Json(body) = payload?;
    let problem = experiment::validate_problem(&body.problem)?;
    let store = state.experiment_store()?;

    let outcome = experiment::submit(store.as_ref(), state.processor.as_ref(), problem, body.input_data.as_deref())
        .await
        .inspect_err(|e| error!(error = %e, "experiment: submit failed"))?;

    Ok(Json(outcome))
}

/// `GET /api/experiments/:id`: one record.
pub async fn get_experiment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExperimentRecord>, ApiError> {
    let store = state.experiment_store()?;
    let record = store
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("experiment not found: {id}")))?;
    Ok(Json(record))
}

/// `GET /api/experiments?limit=`: newest records first.
pub async fn list_experiments(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<ExperimentRecord>>, ApiError> {
    let Query(params) = params?;
    let store = state.experiment_store()?;
    let records = store.list(experiment::clamp_limit(params.limit)).await?;
    Ok(Json(records))
}

#[cfg(test)]
#[path = "experiments_test.rs"]
mod tests;
