//! Indexing state tracking.
//!
//! Submits repositories to the remote indexing service and translates its raw
//! status vocabulary into [`IndexingStatus`]. The tracker keeps the last
//! observed status per repository so that:
//!
//! - the success path is monotonic (`NotStarted → Submitted → Indexing → Completed`),
//!   a remote regression is ignored;
//! - `Error` is sticky until a fresh submission succeeds;
//! - `Completed` is terminal, a later remote failure is ignored until resubmission.
//!
//! Errors are never retried here; the polling loop in
//! [`IndexingTracker::wait_until_completed`] is the caller-side retry policy.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::UserCredentials;
use crate::client::{RemoteStatus, SubmitResponse};
use crate::error::{Error, Result};
use crate::types::{IndexingStatus, RepositoryRef};

/// Remote indexing service contract.
#[async_trait]
pub trait IndexingService: Send + Sync {
    /// Request indexing; must succeed for already-indexed repositories.
    async fn submit(&self, repo: &RepositoryRef, creds: &UserCredentials) -> Result<SubmitResponse>;

    /// Fetch the raw status payload.
    async fn status(&self, repo: &RepositoryRef, creds: &UserCredentials) -> Result<RemoteStatus>;
}

/// Translated status plus the progress counters reported by the service
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub repository: RepositoryRef,
    pub status: IndexingStatus,
    pub raw_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_processed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_files: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Drives repositories through the indexing state machine
pub struct IndexingTracker {
    service: Arc<dyn IndexingService>,
    /// Last observed status per repository
    observed: RwLock<HashMap<RepositoryRef, IndexingStatus>>,
}

impl IndexingTracker {
    pub fn new(service: Arc<dyn IndexingService>) -> Self {
        Self {
            service,
            observed: RwLock::new(HashMap::new()),
        }
    }

    /// Submit a repository for indexing.
    ///
    /// Forwarded as-is; the remote service decides what an already-indexed
    /// repository means. A successful submission clears a sticky `Error`.
    pub async fn submit(&self, repo: &RepositoryRef, creds: &UserCredentials) -> Result<SubmitResponse> {
        let response = self.service.submit(repo, creds).await?;

        self.observed
            .write()
            .await
            .insert(repo.clone(), IndexingStatus::Submitted);
        info!(repository = %repo, "Repository submitted for indexing");

        Ok(response)
    }

    /// Query the remote status and translate it.
    pub async fn poll_status(&self, repo: &RepositoryRef, creds: &UserCredentials) -> Result<IndexingStatus> {
        Ok(self.poll_report(repo, creds).await?.status)
    }

    /// Query the remote status, keeping the progress counters.
    pub async fn poll_report(&self, repo: &RepositoryRef, creds: &UserCredentials) -> Result<StatusReport> {
        let remote = self.service.status(repo, creds).await?;

        let translated = IndexingStatus::from_remote(&remote.status);
        if translated == IndexingStatus::Error && !is_known_failure(&remote.status) {
            warn!(repository = %repo, raw_status = %remote.status, "Unrecognized indexing status");
        }

        let status = {
            let mut observed = self.observed.write().await;
            let previous = observed.get(repo).copied();
            let status = resolve(previous, translated);
            if previous != Some(status) {
                info!(
                    repository = %repo,
                    from = previous.map(|s| s.as_str()).unwrap_or("unknown"),
                    to = %status,
                    "Indexing status changed"
                );
            }
            observed.insert(repo.clone(), status);
            status
        };

        debug!(repository = %repo, raw_status = %remote.status, status = %status, "Polled indexing status");

        Ok(StatusReport {
            repository: repo.clone(),
            status,
            raw_status: remote.status,
            files_processed: remote.files_processed,
            num_files: remote.num_files,
            sha: remote.sha,
        })
    }

    /// Last observed status without remote I/O
    pub async fn last_known(&self, repo: &RepositoryRef) -> IndexingStatus {
        self.observed
            .read()
            .await
            .get(repo)
            .copied()
            .unwrap_or(IndexingStatus::NotStarted)
    }

    /// Poll with a fixed delay until the repository reaches a terminal status.
    ///
    /// Returns `Completed` or `Error`; gives up with [`Error::Timeout`] after
    /// `max_polls` checks and with [`Error::Cancelled`] when `cancel` fires.
    pub async fn wait_until_completed(
        &self,
        repo: &RepositoryRef,
        creds: &UserCredentials,
        interval: Duration,
        max_polls: u32,
        cancel: &CancellationToken,
    ) -> Result<IndexingStatus> {
        for attempt in 1..=max_polls {
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                status = self.poll_status(repo, creds) => status?,
            };
            if status.is_terminal() {
                return Ok(status);
            }
            debug!(repository = %repo, attempt, status = %status, "Indexing not finished, waiting");

            if attempt < max_polls {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }
        Err(Error::timeout(interval * max_polls.saturating_sub(1)))
    }
}

/// Combine the previous local status with a freshly translated one.
fn resolve(previous: Option<IndexingStatus>, observed: IndexingStatus) -> IndexingStatus {
    match (previous, observed) {
        (Some(IndexingStatus::Completed), IndexingStatus::Error) => {
            warn!("Ignoring failure reported after indexing completed");
            IndexingStatus::Completed
        }
        (Some(IndexingStatus::Error), _) | (_, IndexingStatus::Error) => IndexingStatus::Error,
        (Some(prev), next) if prev.progress_rank() > next.progress_rank() => {
            warn!(from = %prev, to = %next, "Ignoring indexing status regression");
            prev
        }
        (_, next) => next,
    }
}

fn is_known_failure(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "failed" | "error")
}
