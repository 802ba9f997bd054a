//! Cached insight reports.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use insight_core::InsightReport;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub repository: Option<String>,
    pub branch: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/reports", get(get_report))
}

/// Latest successful report for a repository
async fn get_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<InsightReport>, ApiError> {
    let repository = query
        .repository
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Repository parameter is required"))?;
    let repo = state
        .repository(&repository, query.branch.as_deref())
        .map_err(|e| ApiError::from_core(e, "Failed to fetch report"))?;

    state
        .cache
        .get(&repo)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No report cached for {}", repo)))
}
