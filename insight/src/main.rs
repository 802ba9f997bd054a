//! insight - Repo Insight CLI
//!
//! Drives the insight pipeline directly against the remote services: submit a
//! repository, poll its indexing status, ask questions, and generate a
//! structured report.

use anyhow::Result;
use clap::Parser;
use insight_core::InsightConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod context;

use cli::{Cli, Commands};
use context::Context;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stderr keeps stdout clean for --json
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("insight=warn".parse()?))
        .init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("insight {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration
    let config = InsightConfig::load()?;
    let ctx = Context::from_config(config, cli.github_token.as_deref(), cli.branch)?;

    // Execute command
    match cli.command {
        Commands::Index { repository } => commands::index::execute(&repository, &ctx).await,
        Commands::Status {
            repository,
            wait,
            json,
        } => commands::status::execute(&repository, wait, json, &ctx).await,
        Commands::Query {
            repository,
            question,
        } => commands::query::execute(&repository, &question, &ctx).await,
        Commands::Analyze {
            repository,
            refresh,
            json,
        } => commands::analyze::execute(&repository, refresh, json, &ctx).await,
        Commands::Version => Ok(()),
    }
}
