//! Pipeline wiring shared by the commands.

use anyhow::{Context as _, Result};
use insight_core::{
    CompletionBackend, Extractor, InMemoryJobStore, IndexingService, IndexingTracker,
    InsightConfig, InsightPipeline, JobTracker, OpenAiCompletion, QueryOrchestrator, QueryService,
    RemoteClient, RepositoryRef, UserCredentials,
};
use std::sync::Arc;

/// Everything a command needs to talk to the remote services
pub struct Context {
    pub config: InsightConfig,
    pub credentials: UserCredentials,
    pub indexing: IndexingTracker,
    pub orchestrator: Arc<QueryOrchestrator>,
    pub jobs: Arc<JobTracker>,
    branch: Option<String>,
}

impl Context {
    /// Build against the configured remote services
    pub fn from_config(
        config: InsightConfig,
        github_token: Option<&str>,
        branch: Option<String>,
    ) -> Result<Self> {
        let credentials = UserCredentials::require(github_token)
            .context("A repository access token is required (--github-token or GITHUB_TOKEN)")?;
        let remote = Arc::new(RemoteClient::from_config(&config)?);
        let completion = Arc::new(OpenAiCompletion::from_config(&config)?);
        Ok(Self::with_services(
            config,
            credentials,
            branch,
            remote.clone(),
            remote,
            completion,
        ))
    }

    pub fn with_services(
        config: InsightConfig,
        credentials: UserCredentials,
        branch: Option<String>,
        indexing: Arc<dyn IndexingService>,
        query: Arc<dyn QueryService>,
        completion: Arc<dyn CompletionBackend>,
    ) -> Self {
        let orchestrator = Arc::new(QueryOrchestrator::new(query));
        let pipeline = Arc::new(InsightPipeline::new(
            orchestrator.clone(),
            Arc::new(Extractor::new(completion)),
        ));
        let jobs = JobTracker::new(Arc::new(InMemoryJobStore::new()), pipeline, config.job_timeout());

        Self {
            credentials,
            indexing: IndexingTracker::new(indexing),
            orchestrator,
            jobs: Arc::new(jobs),
            branch,
            config,
        }
    }

    /// Parse a repository argument with the configured remote and branch
    pub fn repository(&self, input: &str) -> Result<RepositoryRef> {
        let indexing = &self.config.indexing;
        let branch = self.branch.as_deref().unwrap_or(&indexing.default_branch);
        Ok(RepositoryRef::parse(input, indexing.default_remote, branch)?)
    }
}
