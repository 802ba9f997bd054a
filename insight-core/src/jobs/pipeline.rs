//! Battery + extraction, composed into one run.

use std::sync::Arc;
use tracing::info;

use crate::auth::UserCredentials;
use crate::error::Result;
use crate::extraction::Extractor;
use crate::orchestrator::{BatterySession, QueryOrchestrator};
use crate::types::InsightReport;

/// Produces an [`InsightReport`] for one repository
pub struct InsightPipeline {
    orchestrator: Arc<QueryOrchestrator>,
    extractor: Arc<Extractor>,
}

impl InsightPipeline {
    pub fn new(orchestrator: Arc<QueryOrchestrator>, extractor: Arc<Extractor>) -> Self {
        Self {
            orchestrator,
            extractor,
        }
    }

    /// Run the battery, then extract. Stops at the first error.
    pub async fn run(&self, session: &BatterySession, creds: &UserCredentials) -> Result<InsightReport> {
        let combined = self.orchestrator.run_battery(session, creds).await?;
        let report = self
            .extractor
            .extract(&combined, session.cancellation())
            .await?;
        info!(repository = %session.repository(), "Insight pipeline finished");
        Ok(report)
    }
}
