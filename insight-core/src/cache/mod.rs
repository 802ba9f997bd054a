//! Per-repository report cache.
//!
//! Holds the latest successful [`InsightReport`] for each repository until it
//! is explicitly invalidated (refresh) or its optional TTL runs out.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{InsightReport, RepositoryRef};

struct CachedReport {
    report: InsightReport,
    stored_at: Instant,
}

/// Report cache keyed by [`RepositoryRef`]
pub struct ReportCache {
    ttl: Option<Duration>,
    entries: RwLock<HashMap<RepositoryRef, CachedReport>>,
}

impl ReportCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached report, unless absent or expired
    pub async fn get(&self, repository: &RepositoryRef) -> Option<InsightReport> {
        let entries = self.entries.read().await;
        let entry = entries.get(repository)?;
        if self.is_expired(entry) {
            debug!(repository = %repository, "Cached report expired");
            return None;
        }
        Some(entry.report.clone())
    }

    /// Store the latest report, replacing any previous one
    pub async fn put(&self, repository: &RepositoryRef, report: InsightReport) {
        self.entries.write().await.insert(
            repository.clone(),
            CachedReport {
                report,
                stored_at: Instant::now(),
            },
        );
        debug!(repository = %repository, "Report cached");
    }

    /// Drop the cached report. Returns whether one was present.
    pub async fn invalidate(&self, repository: &RepositoryRef) -> bool {
        let removed = self.entries.write().await.remove(repository).is_some();
        if removed {
            debug!(repository = %repository, "Cached report invalidated");
        }
        removed
    }

    /// Remove expired entries
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    fn is_expired(&self, entry: &CachedReport) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_report;

    #[tokio::test]
    async fn test_put_get_invalidate() {
        let cache = ReportCache::default();
        let repo = RepositoryRef::github("acme/widgets");

        assert!(cache.get(&repo).await.is_none());
        cache.put(&repo, sample_report()).await;
        assert_eq!(cache.get(&repo).await, Some(sample_report()));

        assert!(cache.invalidate(&repo).await);
        assert!(cache.get(&repo).await.is_none());
        assert!(!cache.invalidate(&repo).await);
    }

    #[tokio::test]
    async fn test_keyed_by_branch() {
        let cache = ReportCache::default();
        let main = RepositoryRef::github("acme/widgets");
        let dev = RepositoryRef::new(main.remote, "acme/widgets", "develop");

        cache.put(&main, sample_report()).await;
        assert!(cache.get(&dev).await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = ReportCache::new(Some(Duration::from_millis(10)));
        let repo = RepositoryRef::github("acme/widgets");

        cache.put(&repo, sample_report()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.get(&repo).await.is_none());
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 0);
    }
}
