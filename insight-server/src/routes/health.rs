//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub metrics: HealthMetrics,
}

#[derive(Serialize)]
pub struct HealthMetrics {
    pub running_jobs: usize,
    pub total_jobs: usize,
    pub cached_reports: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let (status, counts) = match state.jobs.counts().await {
        Ok(counts) => ("healthy", counts),
        Err(_) => ("degraded", Default::default()),
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        metrics: HealthMetrics {
            running_jobs: counts.running,
            total_jobs: counts.total,
            cached_reports: state.cache.len().await,
        },
    })
}
