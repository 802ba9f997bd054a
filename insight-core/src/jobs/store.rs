//! Job storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{InsightJob, JobOutcome, JobStatus};
use crate::error::{Error, Result};
use crate::types::RepositoryRef;

/// Storage for insight jobs.
///
/// Implementations must only let [`finish`](JobStore::finish) move a job out
/// of `Running`; a terminal job never changes again.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Record a new job. Fails if the id is already taken.
    async fn insert(&self, job: InsightJob) -> Result<()>;

    /// Move a running job to its terminal state.
    ///
    /// Returns `false` if the job was already terminal.
    async fn finish(&self, job_id: &str, outcome: JobOutcome) -> Result<bool>;

    /// Fetch a job by id.
    async fn get(&self, job_id: &str) -> Result<Option<InsightJob>>;

    /// List jobs, newest first, optionally for one repository.
    async fn list(&self, repository: Option<&RepositoryRef>) -> Result<Vec<InsightJob>>;

    /// Remove terminal jobs that finished before `cutoff`.
    async fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// In-process job table
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, InsightJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: InsightJob) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id) {
            return Err(Error::ClientInput(format!("job {} already exists", job.job_id)));
        }
        jobs.insert(job.job_id.clone(), job);
        Ok(())
    }

    async fn finish(&self, job_id: &str, outcome: JobOutcome) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;

        if job.status != JobStatus::Running {
            return Ok(false);
        }

        job.finished_at = Some(Utc::now());
        match outcome {
            JobOutcome::Succeeded(report) => {
                job.status = JobStatus::Succeeded;
                job.result = Some(report);
            }
            JobOutcome::Failed { reason, kind } => {
                job.status = JobStatus::Failed;
                job.failure_reason = Some(reason);
                job.failure_kind = Some(kind);
            }
        }
        Ok(true)
    }

    async fn get(&self, job_id: &str) -> Result<Option<InsightJob>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn list(&self, repository: Option<&RepositoryRef>) -> Result<Vec<InsightJob>> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<InsightJob> = jobs
            .values()
            .filter(|job| repository.is_none_or(|repo| &job.repository == repo))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.finished_at.is_none_or(|finished| finished >= cutoff));
        Ok(before - jobs.len())
    }
}
