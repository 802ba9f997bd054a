//! insight-server - Repo Insight backend server
//!
//! REST API over the indexing, query battery and extraction pipeline.

use insight_core::ServiceToken;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod error;
mod middleware;
mod routes;
mod state;

use config::{Config, LogFormat};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter = EnvFilter::from_default_env()
        .add_directive("insight_server=info".parse()?)
        .add_directive("insight_core=info".parse()?);
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
    }

    info!("insight-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Config loaded from {:?}", config.config_path);

    let service_token = ServiceToken::load_or_generate(&config.service_token_file)?;
    info!(
        token_id = %service_token.token_id,
        "Service token ready at {:?}",
        config.service_token_file
    );

    let bind = config.bind;
    let retention = config.pipeline.job_retention();
    let sweep_interval = config.pipeline.sweep_interval();

    let state = Arc::new(AppState::from_config(config, service_token)?);

    let shutdown = CancellationToken::new();
    let sweeper = state
        .jobs
        .clone()
        .spawn_retention_sweeper(sweep_interval, retention, shutdown.clone());

    let app = routes::create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    shutdown.cancel();
    state.jobs.cancel_all().await;
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Job retention sweeper ended abnormally");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
