//! Insight query battery.
//!
//! Runs the fixed, ordered [`INSIGHT_PROMPTS`] against the query service and
//! joins the answers into one combined document. Queries are issued strictly
//! one after another under a single [`BatterySession`], because the remote
//! service correlates them as one conversation.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::UserCredentials;
use crate::error::{Error, Result};
use crate::types::RepositoryRef;

/// Separator placed between consecutive answers
pub const ANSWER_SEPARATOR: &str = "\n\n";

/// One analysis prompt of the battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsightPrompt {
    pub id: &'static str,
    pub text: &'static str,
}

/// The battery, in concatenation order.
pub const INSIGHT_PROMPTS: [InsightPrompt; 5] = [
    InsightPrompt {
        id: "structure",
        text: "Describe the overall code structure of this repository: the main modules, \
               how they are organised, and how control flows between them.",
    },
    InsightPrompt {
        id: "complexity",
        text: "Identify the most complex areas of this codebase. For each, rate its complexity \
               on a scale of 1 to 10 and suggest concrete refactorings. Finish with an overall \
               complexity rating.",
    },
    InsightPrompt {
        id: "documentation",
        text: "Assess documentation coverage. List the well-documented parts, the parts that \
               need attention, and estimate overall documentation coverage as a percentage.",
    },
    InsightPrompt {
        id: "dependencies",
        text: "List the external dependencies and the internal modules this repository relies \
               on, and explain how they relate to each other.",
    },
    InsightPrompt {
        id: "health",
        text: "Estimate code health metrics as numbers: code quality (0-100), test coverage \
               (0-100), cyclomatic complexity, code duplication (0-100), maintainability index \
               (0-100) and code churn. List any security vulnerabilities with a severity of \
               low, medium, high or critical.",
    },
];

/// Conversation context shared by every query of one battery run.
///
/// A fresh session id is minted per run, so batteries for different
/// repositories or retries never share one.
#[derive(Debug, Clone)]
pub struct BatterySession {
    session_id: String,
    repository: RepositoryRef,
    cancel: CancellationToken,
}

impl BatterySession {
    pub fn new(repository: RepositoryRef) -> Self {
        Self::with_cancellation(repository, CancellationToken::new())
    }

    pub fn with_cancellation(repository: RepositoryRef, cancel: CancellationToken) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            repository,
            cancel,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn repository(&self) -> &RepositoryRef {
        &self.repository
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Remote query service contract.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Ask one question about `session.repository()`, returning the answer text.
    async fn query(&self, session: &BatterySession, text: &str, creds: &UserCredentials) -> Result<String>;
}

/// Runs prompt batteries against a [`QueryService`]
pub struct QueryOrchestrator {
    service: Arc<dyn QueryService>,
}

impl QueryOrchestrator {
    pub fn new(service: Arc<dyn QueryService>) -> Self {
        Self { service }
    }

    /// Run every prompt in order and join the answers.
    ///
    /// The first failure aborts the battery; later prompts are not sent and
    /// the error is returned tagged with the failing prompt's id.
    pub async fn run_battery(&self, session: &BatterySession, creds: &UserCredentials) -> Result<String> {
        info!(
            repository = %session.repository(),
            session_id = %session.session_id(),
            "Running insight battery"
        );

        let mut answers = Vec::with_capacity(INSIGHT_PROMPTS.len());
        for prompt in INSIGHT_PROMPTS.iter() {
            let answer = tokio::select! {
                biased;
                _ = session.cancellation().cancelled() => return Err(Error::Cancelled),
                answer = self.service.query(session, prompt.text, creds) => {
                    answer.map_err(|e| Error::for_prompt(prompt.id, e))?
                }
            };
            debug!(prompt = prompt.id, chars = answer.len(), "Prompt answered");
            answers.push(answer);
        }

        Ok(answers.join(ANSWER_SEPARATOR))
    }

    /// Single ad hoc question under its own fresh session.
    pub async fn ask(&self, repository: &RepositoryRef, text: &str, creds: &UserCredentials) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::ClientInput("query must not be empty".into()));
        }
        let session = BatterySession::new(repository.clone());
        self.service.query(&session, text, creds).await
    }
}
