//! Application state.

use insight_core::{
    CompletionBackend, Extractor, InMemoryJobStore, IndexingService, IndexingTracker,
    InsightPipeline, JobTracker, OpenAiCompletion, QueryOrchestrator, QueryService, RemoteClient,
    ReportCache, RepositoryRef, Result, ServiceToken,
};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Token API callers present as `Authorization: Bearer`
    pub service_token: Arc<ServiceToken>,
    /// Indexing status tracker
    pub indexing: Arc<IndexingTracker>,
    /// Prompt battery and ad hoc queries
    pub orchestrator: Arc<QueryOrchestrator>,
    /// Background insight jobs
    pub jobs: Arc<JobTracker>,
    /// Latest report per repository
    pub cache: Arc<ReportCache>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Wire the pipeline against the configured remote services
    pub fn from_config(config: Config, service_token: ServiceToken) -> Result<Self> {
        let remote = Arc::new(RemoteClient::from_config(&config.pipeline)?);
        let completion = Arc::new(OpenAiCompletion::from_config(&config.pipeline)?);
        Ok(Self::with_services(
            config,
            service_token,
            remote.clone(),
            remote,
            completion,
        ))
    }

    /// Wire the pipeline against explicit service implementations
    pub fn with_services(
        config: Config,
        service_token: ServiceToken,
        indexing: Arc<dyn IndexingService>,
        query: Arc<dyn QueryService>,
        completion: Arc<dyn CompletionBackend>,
    ) -> Self {
        let cache = Arc::new(ReportCache::new(config.pipeline.cache_ttl()));
        let orchestrator = Arc::new(QueryOrchestrator::new(query));
        let extractor = Arc::new(Extractor::new(completion));
        let pipeline = Arc::new(InsightPipeline::new(orchestrator.clone(), extractor));
        let jobs = JobTracker::new(
            Arc::new(InMemoryJobStore::new()),
            pipeline,
            config.pipeline.job_timeout(),
        )
        .with_cache(cache.clone());

        Self {
            service_token: Arc::new(service_token),
            indexing: Arc::new(IndexingTracker::new(indexing)),
            orchestrator,
            jobs: Arc::new(jobs),
            cache,
            start_time: Instant::now(),
            config: Arc::new(config),
        }
    }

    /// Parse caller input using the configured remote.
    ///
    /// `branch` replaces the configured default; a branch embedded as
    /// `owner/name@branch` still wins over both.
    pub fn repository(&self, input: &str, branch: Option<&str>) -> Result<RepositoryRef> {
        let indexing = &self.config.pipeline.indexing;
        let branch = branch
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(&indexing.default_branch);
        RepositoryRef::parse(input, indexing.default_remote, branch)
    }
}
