//! Full pipeline: make sure the repository is indexed, run one insight job,
//! print the report.

use anyhow::{bail, Result};
use colored::Colorize;
use insight_core::{IndexingStatus, InsightJob, InsightReport, JobStatus, RepositoryRef};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{cancel_on_ctrl_c, spinner};
use crate::context::Context;

const JOB_POLL: Duration = Duration::from_millis(250);

pub async fn execute(repository: &str, refresh: bool, json: bool, ctx: &Context) -> Result<()> {
    let repo = ctx.repository(repository)?;
    let cancel = cancel_on_ctrl_c();

    let bar = spinner(format!("Preparing {}", repo));
    let result = run(&repo, refresh, ctx, &cancel, |msg| bar.set_message(msg)).await;
    bar.finish_and_clear();
    let job = result?;

    match (job.status, job.result) {
        (JobStatus::Succeeded, Some(report)) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&repo, &report);
            }
            Ok(())
        }
        _ => bail!(
            "Insight job {} failed: {}",
            job.job_id,
            job.failure_reason.as_deref().unwrap_or("unknown reason")
        ),
    }
}

/// Index if needed, then start one job and wait for its terminal record.
async fn run(
    repo: &RepositoryRef,
    refresh: bool,
    ctx: &Context,
    cancel: &CancellationToken,
    progress: impl Fn(String),
) -> Result<InsightJob> {
    let current = match ctx.indexing.poll_status(repo, &ctx.credentials).await {
        Ok(status) => status,
        // Never-submitted repositories are unknown to the indexing service
        Err(e) if e.status_code() == Some(404) => IndexingStatus::NotStarted,
        Err(e) => return Err(e.into()),
    };

    if refresh || matches!(current, IndexingStatus::NotStarted | IndexingStatus::Error) {
        progress(format!("Submitting {} for indexing", repo));
        ctx.indexing.submit(repo, &ctx.credentials).await?;
    }

    progress(format!("Waiting for {} to finish indexing", repo));
    let indexed = ctx
        .indexing
        .wait_until_completed(
            repo,
            &ctx.credentials,
            ctx.config.poll_interval(),
            ctx.config.indexing.max_polls,
            cancel,
        )
        .await?;
    if indexed == IndexingStatus::Error {
        bail!("Indexing of {} failed", repo);
    }

    progress(format!("Generating insights for {}", repo));
    let job_id = ctx
        .jobs
        .start_job(repo.clone(), ctx.credentials.clone())
        .await?;
    info!(job_id = %job_id, repository = %repo, "Waiting for insight job");

    tokio::select! {
        job = ctx.jobs.wait_for(&job_id, JOB_POLL) => Ok(job?),
        _ = cancel.cancelled() => {
            ctx.jobs.cancel_job(&job_id).await?;
            Ok(ctx.jobs.wait_for(&job_id, JOB_POLL).await?)
        }
    }
}

fn print_report(repo: &RepositoryRef, report: &InsightReport) {
    let health = &report.code_health_metrics;

    println!("{}", format!("Insights for {}", repo).bold());
    println!();
    println!("{}", "Structure".cyan().bold());
    println!("  {}", report.code_structure.description);
    println!();

    println!("{}", "Complexity".cyan().bold());
    println!("  Overall: {:.1}", report.complexity_analysis.overall_complexity);
    for area in &report.complexity_analysis.complex_areas {
        println!("  {} ({})", area.area.bold(), area.complexity);
        for suggestion in &area.refactoring_suggestions {
            println!("    - {}", suggestion);
        }
    }
    println!();

    println!("{}", "Documentation".cyan().bold());
    println!("  Coverage: {:.0}%", report.documentation_coverage.overall_coverage);
    for path in &report.documentation_coverage.needs_attention {
        println!("  {} {}", "!".yellow(), path);
    }
    println!();

    println!("{}", "Dependencies".cyan().bold());
    println!("  External: {}", report.dependency_tracker.external.join(", "));
    println!("  Internal: {}", report.dependency_tracker.internal.join(", "));
    println!("  {}", report.dependency_tracker.dependency_relations.dimmed());
    println!();

    println!("{}", "Health".cyan().bold());
    println!("  Code quality:          {:.0}/100", health.code_quality);
    println!("  Test coverage:         {:.0}%", health.test_coverage);
    println!("  Maintainability index: {:.0}", health.maintainability_index);
    println!("  Cyclomatic complexity: {}", health.cyclomatic_complexity);
    println!("  Code duplication:      {:.0}%", health.code_duplication);
    println!("  Code churn:            {}", health.code_churn);
    if health.security_vulnerabilities.is_empty() {
        println!("  {} No known vulnerabilities", "✓".green());
    }
    for vuln in &health.security_vulnerabilities {
        println!("  {} [{:?}] {}", "✗".red(), vuln.severity, vuln.description);
    }
}
