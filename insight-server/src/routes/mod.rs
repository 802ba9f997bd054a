//! API route modules.

pub mod health;
pub mod jobs;
pub mod reports;
pub mod repositories;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health::health_check));

    // Protected routes (require auth)
    let protected_routes = Router::new()
        .merge(repositories::router())
        .merge(jobs::router())
        .merge(reports::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .nest("/api", protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::middleware::auth::GITHUB_TOKEN_HEADER;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use insight_core::testing::{
        sample_report_json, ScriptedIndexingService, ScriptedQueryService, StaticCompletionBackend,
    };
    use insight_core::ServiceToken;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        token: String,
        indexing: Arc<ScriptedIndexingService>,
        query: Arc<ScriptedQueryService>,
        _dir: tempfile::TempDir,
    }

    fn harness_with(
        indexing: ScriptedIndexingService,
        query: ScriptedQueryService,
        completion: StaticCompletionBackend,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path(), &dir.path().join("config.toml")).unwrap();
        let service_token = ServiceToken::generate();
        let token = service_token.encoded();

        let indexing = Arc::new(indexing);
        let query = Arc::new(query);
        let state = AppState::with_services(
            config,
            service_token,
            indexing.clone(),
            query.clone(),
            Arc::new(completion),
        );

        Harness {
            app: create_router(Arc::new(state)),
            token,
            indexing,
            query,
            _dir: dir,
        }
    }

    fn harness() -> Harness {
        harness_with(
            ScriptedIndexingService::new(&["completed"]),
            ScriptedQueryService::answering_with_prompt_ids(),
            StaticCompletionBackend::replying(sample_report_json().to_string()),
        )
    }

    impl Harness {
        fn authorized(&self, method: &str, uri: &str) -> axum::http::request::Builder {
            Request::builder()
                .method(method)
                .uri(uri)
                .header("Authorization", format!("Bearer {}", self.token))
                .header(GITHUB_TOKEN_HEADER, "ghp_test")
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }

        async fn post_action(&self, body: Value) -> (StatusCode, Value) {
            let request = self
                .authorized("POST", "/api/repositories")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            self.send(request).await
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            let request = self.authorized("GET", uri).body(Body::empty()).unwrap();
            self.send(request).await
        }

        async fn wait_for_terminal(&self, job_id: &str) -> Value {
            for _ in 0..200 {
                let (status, job) = self.get(&format!("/api/jobs/{}", job_id)).await;
                assert_eq!(status, StatusCode::OK);
                if job["status"] != "running" {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("job {} never finished", job_id);
        }
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let h = harness();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = h.send(request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["metrics"]["total_jobs"], 0);
    }

    #[tokio::test]
    async fn test_missing_service_token_is_rejected_before_pipeline() {
        let h = harness();
        let request = Request::builder()
            .method("POST")
            .uri("/api/repositories")
            .header(GITHUB_TOKEN_HEADER, "ghp_test")
            .header("content-type", "application/json")
            .body(Body::from(json!({"action": "index", "repository": "acme/widgets"}).to_string()))
            .unwrap();
        let (status, body) = h.send(request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "MISSING_TOKEN");
        assert_eq!(h.indexing.submissions(), 0);
    }

    #[tokio::test]
    async fn test_wrong_service_token_is_rejected() {
        let h = harness();
        let request = Request::builder()
            .uri("/api/repositories?repository=acme/widgets")
            .header("Authorization", format!("Bearer {}", ServiceToken::generate().encoded()))
            .header(GITHUB_TOKEN_HEADER, "ghp_test")
            .body(Body::empty())
            .unwrap();
        let (status, body) = h.send(request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_TOKEN");
        assert_eq!(h.indexing.status_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_repository_token_is_rejected() {
        let h = harness();
        let request = Request::builder()
            .method("POST")
            .uri("/api/repositories")
            .header("Authorization", format!("Bearer {}", h.token))
            .header("content-type", "application/json")
            .body(Body::from(json!({"action": "insights", "repository": "acme/widgets"}).to_string()))
            .unwrap();
        let (status, body) = h.send(request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "MISSING_REPOSITORY_TOKEN");
        assert!(h.query.calls().is_empty());
    }

    #[tokio::test]
    async fn test_index_action_mirrors_submission() {
        let h = harness();
        let (status, body) = h
            .post_action(json!({"action": "index", "repository": "acme/widgets"}))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "started repo processing");
        assert_eq!(h.indexing.submissions(), 1);
    }

    #[tokio::test]
    async fn test_unknown_action_is_bad_request() {
        let h = harness();
        let (status, body) = h
            .post_action(json!({"action": "reindex", "repository": "acme/widgets"}))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid action: reindex");
        assert_eq!(h.indexing.submissions(), 0);
    }

    #[tokio::test]
    async fn test_malformed_repository_is_bad_request() {
        let h = harness();
        let (status, _) = h
            .post_action(json!({"action": "index", "repository": "not a repo"}))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(h.indexing.submissions(), 0);
    }

    #[tokio::test]
    async fn test_status_progression_across_polls() {
        let h = harness_with(
            ScriptedIndexingService::new(&["not started", "submitted", "processing", "completed"]),
            ScriptedQueryService::answering_with_prompt_ids(),
            StaticCompletionBackend::replying(sample_report_json().to_string()),
        );

        let mut seen = Vec::new();
        for _ in 0..4 {
            let (status, body) = h.get("/api/repositories?repository=acme/widgets").await;
            assert_eq!(status, StatusCode::OK);
            seen.push(body["status"].as_str().unwrap().to_string());
        }

        assert_eq!(seen, ["not_started", "submitted", "indexing", "completed"]);
    }

    #[tokio::test]
    async fn test_status_requires_repository() {
        let h = harness();
        let (status, body) = h.get("/api/repositories").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Repository parameter is required");
    }

    #[tokio::test]
    async fn test_status_upstream_failure_is_generic() {
        let h = harness_with(
            ScriptedIndexingService::new(&["completed"]).failing_status(503),
            ScriptedQueryService::answering_with_prompt_ids(),
            StaticCompletionBackend::replying(sample_report_json().to_string()),
        );
        let (status, body) = h.get("/api/repositories?repository=acme/widgets").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to check indexing progress");
    }

    #[tokio::test]
    async fn test_query_action_returns_raw_answer() {
        let h = harness();
        let (status, body) = h
            .post_action(json!({
                "action": "query",
                "repository": "acme/widgets",
                "query": "Where is the entry point?"
            }))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("answer:adhoc"));
        assert_eq!(h.query.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_query_upstream_failure_is_generic() {
        let h = harness_with(
            ScriptedIndexingService::new(&["completed"]),
            ScriptedQueryService::answering_with_prompt_ids().failing_on_call(1, 502),
            StaticCompletionBackend::replying(sample_report_json().to_string()),
        );
        let (status, body) = h
            .post_action(json!({
                "action": "query",
                "repository": "acme/widgets",
                "query": "Where is the entry point?"
            }))
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to query repository");
    }

    #[tokio::test]
    async fn test_insights_job_is_retrievable_and_cached() {
        let h = harness();
        let (status, body) = h
            .post_action(json!({"action": "insights", "repository": "acme/widgets"}))
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let job_id = body["jobId"].as_str().unwrap().to_string();

        let job = h.wait_for_terminal(&job_id).await;
        assert_eq!(job["status"], "succeeded");
        assert_eq!(job["result"]["codeHealthMetrics"]["codeQuality"], 78.0);
        assert!(job.get("failureReason").is_none());

        let (status, report) = h.get("/api/reports?repository=acme/widgets").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report, job["result"]);

        let (status, jobs) = h.get("/api/jobs?repository=acme/widgets").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(jobs.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_prompt_is_recorded_on_job() {
        let h = harness_with(
            ScriptedIndexingService::new(&["completed"]),
            ScriptedQueryService::answering_with_prompt_ids().failing_on_call(3, 500),
            StaticCompletionBackend::replying(sample_report_json().to_string()),
        );
        let (_, body) = h
            .post_action(json!({"action": "insights", "repository": "acme/widgets"}))
            .await;
        let job = h.wait_for_terminal(body["jobId"].as_str().unwrap()).await;

        assert_eq!(job["status"], "failed");
        assert!(job["failureReason"].as_str().unwrap().contains("documentation"));
        assert!(job.get("result").is_none());

        let (status, _) = h.get("/api/reports?repository=acme/widgets").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_inline_insights_schema_failure_is_unprocessable() {
        let mut reply = sample_report_json();
        reply.as_object_mut().unwrap().remove("codeHealthMetrics");
        let h = harness_with(
            ScriptedIndexingService::new(&["completed"]),
            ScriptedQueryService::answering_with_prompt_ids(),
            StaticCompletionBackend::replying(reply.to_string()),
        );

        let (status, body) = h
            .post_action(json!({"action": "insights", "repository": "acme/widgets", "wait": true}))
            .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "SCHEMA_VALIDATION");
    }

    #[tokio::test]
    async fn test_inline_insights_reuses_cache_until_refresh() {
        let h = harness();

        let (status, first) = h
            .post_action(json!({"action": "insights", "repository": "acme/widgets", "wait": true}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.query.calls().len(), 5);

        let (_, second) = h
            .post_action(json!({"action": "insights", "repository": "acme/widgets", "wait": true}))
            .await;
        assert_eq!(second, first);
        assert_eq!(h.query.calls().len(), 5);

        let (status, _) = h
            .post_action(json!({
                "action": "insights",
                "repository": "acme/widgets",
                "wait": true,
                "refresh": true
            }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.query.calls().len(), 10);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let h = harness();
        let (status, _) = h.get("/api/jobs/job-missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let h = harness_with(
            ScriptedIndexingService::new(&["completed"]),
            ScriptedQueryService::answering_with_prompt_ids().with_delay(Duration::from_secs(30)),
            StaticCompletionBackend::replying(sample_report_json().to_string()),
        );
        let (_, body) = h
            .post_action(json!({"action": "insights", "repository": "acme/widgets"}))
            .await;
        let job_id = body["jobId"].as_str().unwrap().to_string();

        let request = h
            .authorized("DELETE", &format!("/api/jobs/{}", job_id))
            .body(Body::empty())
            .unwrap();
        let (status, _) = h.send(request).await;
        assert_eq!(status, StatusCode::OK);

        let job = h.wait_for_terminal(&job_id).await;
        assert_eq!(job["status"], "failed");
        assert_eq!(job["failureKind"], "cancelled");
    }
}
