//! Repository action endpoint: indexing, ad hoc queries and insight jobs.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use insight_core::{indexing::StatusReport, BatterySession, RepositoryRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::state::AppState;

const ACTIONS: [&str; 3] = ["index", "query", "insights"];

/// Body of `POST /api/repositories`, dispatched on `action`
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum ActionRequest {
    Index {
        repository: String,
        #[serde(default)]
        branch: Option<String>,
    },
    Query {
        repository: String,
        query: String,
        #[serde(default)]
        branch: Option<String>,
    },
    Insights {
        repository: String,
        #[serde(default)]
        branch: Option<String>,
        /// Drop the cached report before running
        #[serde(default)]
        refresh: bool,
        /// Run inline and return the report instead of a job id
        #[serde(default)]
        wait: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStarted {
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub repository: Option<String>,
    pub branch: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/repositories", post(handle_action).get(indexing_status))
}

/// Dispatch a repository action
async fn handle_action(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let request = parse_action(body)?;

    match request {
        ActionRequest::Index { repository, branch } => {
            let repo = state
                .repository(&repository, branch.as_deref())
                .map_err(|e| ApiError::from_core(e, "Failed to submit repository"))?;
            let response = state
                .indexing
                .submit(&repo, &auth.credentials)
                .await
                .map_err(|e| ApiError::from_core(e, "Failed to submit repository"))?;
            Ok(Json(response).into_response())
        }
        ActionRequest::Query {
            repository,
            query,
            branch,
        } => {
            let repo = state
                .repository(&repository, branch.as_deref())
                .map_err(|e| ApiError::from_core(e, "Failed to query repository"))?;
            let answer = state
                .orchestrator
                .ask(&repo, &query, &auth.credentials)
                .await
                .map_err(|e| ApiError::from_core(e, "Failed to query repository"))?;
            Ok(Json(answer).into_response())
        }
        ActionRequest::Insights {
            repository,
            branch,
            refresh,
            wait,
        } => {
            let repo = state
                .repository(&repository, branch.as_deref())
                .map_err(|e| ApiError::from_core(e, "Failed to start insights job"))?;
            if refresh {
                state.cache.invalidate(&repo).await;
            }
            if wait {
                return run_insights_inline(&state, repo, &auth).await;
            }

            let job_id = state
                .jobs
                .start_job(repo, auth.credentials)
                .await
                .map_err(|e| ApiError::from_core(e, "Failed to start insights job"))?;
            Ok((StatusCode::ACCEPTED, Json(JobStarted { job_id })).into_response())
        }
    }
}

/// Battery and extraction in the request, answering with the report itself
async fn run_insights_inline(
    state: &AppState,
    repo: RepositoryRef,
    auth: &AuthContext,
) -> Result<Response, ApiError> {
    if let Some(report) = state.cache.get(&repo).await {
        info!(repository = %repo, "Serving cached insight report");
        return Ok(Json(report).into_response());
    }

    let session = BatterySession::new(repo.clone());
    let report = state
        .jobs
        .run_with_deadline(&session, &auth.credentials)
        .await
        .map_err(|e| ApiError::from_core(e, "Failed to generate insights"))?;

    state.cache.put(&repo, report.clone()).await;
    Ok(Json(report).into_response())
}

/// Current indexing status for `?repository=owner/name[&branch=...]`
async fn indexing_status(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusReport>, ApiError> {
    let repository = query
        .repository
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Repository parameter is required"))?;

    let repo = state
        .repository(&repository, query.branch.as_deref())
        .map_err(|e| ApiError::from_core(e, "Failed to check indexing progress"))?;
    let report = state
        .indexing
        .poll_report(&repo, &auth.credentials)
        .await
        .map_err(|e| ApiError::from_core(e, "Failed to check indexing progress"))?;

    Ok(Json(report))
}

fn parse_action(body: Value) -> Result<ActionRequest, ApiError> {
    match body.get("action").and_then(Value::as_str) {
        Some(action) if ACTIONS.contains(&action) => {}
        Some(action) => return Err(ApiError::bad_request(format!("Invalid action: {}", action))),
        None => return Err(ApiError::bad_request("Missing action")),
    }
    serde_json::from_value(body).map_err(|e| ApiError::bad_request(format!("Invalid request: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index_action() {
        let request = parse_action(serde_json::json!({
            "action": "index",
            "repository": "acme/widgets"
        }))
        .unwrap();
        assert!(matches!(request, ActionRequest::Index { repository, branch: None } if repository == "acme/widgets"));
    }

    #[test]
    fn test_parse_insights_flags_default_off() {
        let request = parse_action(serde_json::json!({
            "action": "insights",
            "repository": "acme/widgets"
        }))
        .unwrap();
        assert!(matches!(
            request,
            ActionRequest::Insights {
                refresh: false,
                wait: false,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = parse_action(serde_json::json!({
            "action": "delete",
            "repository": "acme/widgets"
        }))
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_query_requires_text() {
        let err = parse_action(serde_json::json!({
            "action": "query",
            "repository": "acme/widgets"
        }))
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
