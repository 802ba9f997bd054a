//! Insight job retrieval, listing and cancellation.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use insight_core::InsightJob;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub repository: Option<String>,
    pub branch: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job).delete(cancel_job))
}

/// Jobs, newest first
async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<InsightJob>>, ApiError> {
    let repository = match query.repository.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(input) => Some(
            state
                .repository(input, query.branch.as_deref())
                .map_err(|e| ApiError::from_core(e, "Failed to list jobs"))?,
        ),
        None => None,
    };

    let jobs = state
        .jobs
        .list_jobs(repository.as_ref())
        .await
        .map_err(|e| ApiError::from_core(e, "Failed to list jobs"))?;
    Ok(Json(jobs))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<InsightJob>, ApiError> {
    let job = state
        .jobs
        .get_job(&id)
        .await
        .map_err(|e| ApiError::from_core(e, "Failed to fetch job"))?;
    Ok(Json(job))
}

/// Request cancellation; answers with the job as it stands now
async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<InsightJob>, ApiError> {
    let job = state
        .jobs
        .cancel_job(&id)
        .await
        .map_err(|e| ApiError::from_core(e, "Failed to cancel job"))?;
    Ok(Json(job))
}
