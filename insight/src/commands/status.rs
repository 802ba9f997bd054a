//! Indexing status of a repository.

use anyhow::Result;
use colored::Colorize;

use super::{cancel_on_ctrl_c, spinner, status_label};
use crate::context::Context;

pub async fn execute(repository: &str, wait: bool, json: bool, ctx: &Context) -> Result<()> {
    let repo = ctx.repository(repository)?;

    if wait {
        let bar = spinner(format!("Waiting for {} to finish indexing", repo));
        let result = ctx
            .indexing
            .wait_until_completed(
                &repo,
                &ctx.credentials,
                ctx.config.poll_interval(),
                ctx.config.indexing.max_polls,
                &cancel_on_ctrl_c(),
            )
            .await;
        bar.finish_and_clear();
        result?;
    }

    let report = ctx.indexing.poll_report(&repo, &ctx.credentials).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} {}", repo.to_string().bold(), status_label(report.status));
    if let (Some(done), Some(total)) = (report.files_processed, report.num_files) {
        println!("  Files: {}/{}", done, total);
    }
    if let Some(sha) = &report.sha {
        println!("  Commit: {}", sha.dimmed());
    }
    if report.raw_status != report.status.as_str() {
        println!("  Remote status: {}", report.raw_status.dimmed());
    }
    Ok(())
}
