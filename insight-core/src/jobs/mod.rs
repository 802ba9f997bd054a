//! Background insight jobs.
//!
//! [`JobTracker::start_job`] records a `Running` job and spawns its work
//! (battery, then extraction) without waiting for it. Each job is written only
//! by the task that runs it, and exactly once: `Running → Succeeded` or
//! `Running → Failed`. Failures are contained on the job record and logged;
//! they never reach the caller that started the job.
//!
//! Concurrent jobs for the same repository are independent and are not
//! coalesced.

mod pipeline;
mod store;

pub use pipeline::InsightPipeline;
pub use store::{InMemoryJobStore, JobStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::UserCredentials;
use crate::cache::ReportCache;
use crate::error::{Error, Result};
use crate::orchestrator::BatterySession;
use crate::types::{InsightReport, RepositoryRef};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Coarse cause of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Auth,
    Upstream,
    Transport,
    SchemaValidation,
    Timeout,
    Cancelled,
    Other,
}

impl FailureKind {
    pub fn of(err: &Error) -> Self {
        match err.root() {
            Error::Auth(_) => FailureKind::Auth,
            Error::Upstream { .. } => FailureKind::Upstream,
            Error::Transport(_) => FailureKind::Transport,
            Error::SchemaValidation(_) => FailureKind::SchemaValidation,
            Error::Timeout { .. } => FailureKind::Timeout,
            Error::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::Other,
        }
    }
}

/// One asynchronous execution of the insight pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightJob {
    pub job_id: String,
    pub repository: RepositoryRef,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<InsightReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
}

impl InsightJob {
    /// A freshly started job
    pub fn running(job_id: String, repository: RepositoryRef) -> Self {
        Self {
            job_id,
            repository,
            status: JobStatus::Running,
            created_at: Utc::now(),
            finished_at: None,
            result: None,
            failure_reason: None,
            failure_kind: None,
        }
    }
}

/// Terminal result handed to [`JobStore::finish`].
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Succeeded(InsightReport),
    Failed { reason: String, kind: FailureKind },
}

impl From<Result<InsightReport>> for JobOutcome {
    fn from(result: Result<InsightReport>) -> Self {
        match result {
            Ok(report) => JobOutcome::Succeeded(report),
            Err(e) => JobOutcome::Failed {
                kind: FailureKind::of(&e),
                reason: e.to_string(),
            },
        }
    }
}

/// Job counts for health reporting
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct JobCounts {
    pub running: usize,
    pub total: usize,
}

/// Registers jobs and runs them in the background
pub struct JobTracker {
    store: Arc<dyn JobStore>,
    pipeline: Arc<InsightPipeline>,
    cache: Option<Arc<ReportCache>>,
    /// Deadline for a whole job
    timeout: Duration,
    /// Cancellation handles of jobs still running: job_id -> token
    running: RwLock<HashMap<String, CancellationToken>>,
}

impl JobTracker {
    pub fn new(store: Arc<dyn JobStore>, pipeline: Arc<InsightPipeline>, timeout: Duration) -> Self {
        Self {
            store,
            pipeline,
            cache: None,
            timeout,
            running: RwLock::new(HashMap::new()),
        }
    }

    /// Publish successful reports into `cache`
    pub fn with_cache(mut self, cache: Arc<ReportCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Register a job and schedule its work. Returns immediately.
    pub async fn start_job(self: &Arc<Self>, repository: RepositoryRef, creds: UserCredentials) -> Result<String> {
        creds.ensure_present()?;

        let job_id = format!("job-{}", uuid::Uuid::new_v4());
        self.store
            .insert(InsightJob::running(job_id.clone(), repository.clone()))
            .await?;

        let cancel = CancellationToken::new();
        self.running
            .write()
            .await
            .insert(job_id.clone(), cancel.clone());

        info!(job_id = %job_id, repository = %repository, "Insight job started");

        let tracker = Arc::clone(self);
        let id = job_id.clone();
        tokio::spawn(async move {
            tracker.execute(id, repository, creds, cancel).await;
        });

        Ok(job_id)
    }

    /// Body of the background task; the only writer of this job's record.
    async fn execute(
        &self,
        job_id: String,
        repository: RepositoryRef,
        creds: UserCredentials,
        cancel: CancellationToken,
    ) {
        let session = BatterySession::with_cancellation(repository.clone(), cancel);
        let result = self.run_with_deadline(&session, &creds).await;

        if let (Ok(report), Some(cache)) = (&result, &self.cache) {
            cache.put(&repository, report.clone()).await;
        }

        let outcome = JobOutcome::from(result);
        match &outcome {
            JobOutcome::Succeeded(_) => {
                info!(job_id = %job_id, repository = %repository, "Insight job succeeded");
            }
            JobOutcome::Failed { reason, kind } => {
                error!(
                    job_id = %job_id,
                    repository = %repository,
                    kind = ?kind,
                    reason = %reason,
                    "Insight job failed"
                );
            }
        }

        match self.store.finish(&job_id, outcome).await {
            Ok(true) => {}
            Ok(false) => warn!(job_id = %job_id, "Job already terminal, outcome dropped"),
            Err(e) => error!(job_id = %job_id, error = %e, "Failed to record job outcome"),
        }

        self.running.write().await.remove(&job_id);
    }

    /// Run the pipeline under the job deadline, without a job record.
    pub async fn run_with_deadline(
        &self,
        session: &BatterySession,
        creds: &UserCredentials,
    ) -> Result<InsightReport> {
        match tokio::time::timeout(self.timeout, self.pipeline.run(session, creds)).await {
            Ok(result) => result,
            Err(_) => {
                session.cancellation().cancel();
                Err(Error::timeout(self.timeout))
            }
        }
    }

    /// Current record of a job
    pub async fn get_job(&self, job_id: &str) -> Result<InsightJob> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))
    }

    /// Jobs, newest first, optionally for one repository
    pub async fn list_jobs(&self, repository: Option<&RepositoryRef>) -> Result<Vec<InsightJob>> {
        self.store.list(repository).await
    }

    /// Ask a running job to stop. The job's own task records `Failed`.
    ///
    /// Cancelling a terminal job is a no-op.
    pub async fn cancel_job(&self, job_id: &str) -> Result<InsightJob> {
        let job = self.get_job(job_id).await?;
        if let Some(token) = self.running.read().await.get(job_id) {
            token.cancel();
            info!(job_id = %job_id, "Insight job cancellation requested");
        }
        Ok(job)
    }

    /// Poll until the job is terminal
    pub async fn wait_for(&self, job_id: &str, poll: Duration) -> Result<InsightJob> {
        loop {
            let job = self.get_job(job_id).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub async fn counts(&self) -> Result<JobCounts> {
        let jobs = self.store.list(None).await?;
        Ok(JobCounts {
            running: jobs.iter().filter(|j| !j.status.is_terminal()).count(),
            total: jobs.len(),
        })
    }

    /// Evict terminal jobs older than `retention`
    ///
    /// A retention reaching back past the representable time range evicts
    /// nothing. Expired cached reports are purged on the same pass.
    pub async fn sweep(&self, retention: Duration) -> Result<usize> {
        if let Some(cache) = &self.cache {
            let purged = cache.purge_expired().await;
            if purged > 0 {
                debug!(count = purged, "Purged expired cached reports");
            }
        }

        let cutoff = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention));
        let Some(cutoff) = cutoff else {
            debug!(retention_secs = retention.as_secs(), "Retention exceeds time range, nothing to evict");
            return Ok(0);
        };

        let evicted = self.store.evict_finished_before(cutoff).await?;
        if evicted > 0 {
            info!(count = evicted, "Evicted finished insight jobs");
        }
        Ok(evicted)
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `shutdown` fires
    pub fn spawn_retention_sweeper(
        self: Arc<Self>,
        interval: Duration,
        retention: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep(retention).await {
                            error!(error = %e, "Job retention sweep failed");
                        }
                    }
                }
            }
            debug!("Job retention sweeper stopped");
        })
    }

    /// Cancel every running job
    pub async fn cancel_all(&self) {
        for (job_id, token) in self.running.read().await.iter() {
            token.cancel();
            debug!(job_id = %job_id, "Cancelled on shutdown");
        }
    }
}
