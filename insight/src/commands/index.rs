//! Submit a repository for indexing.

use anyhow::Result;
use colored::Colorize;

use crate::context::Context;

pub async fn execute(repository: &str, ctx: &Context) -> Result<()> {
    let repo = ctx.repository(repository)?;
    let response = ctx.indexing.submit(&repo, &ctx.credentials).await?;

    println!("{} Submitted {} for indexing", "✓".green(), repo.to_string().bold());
    if let Some(message) = response.response {
        println!("  {}", message);
    }
    if let Some(endpoint) = response.status_endpoint {
        println!("  Status endpoint: {}", endpoint.dimmed());
    }
    Ok(())
}
