//! Deterministic fakes for the remote services.
//!
//! Enabled for unit tests and, through the `testing` feature, for dependent
//! crates' tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::auth::UserCredentials;
use crate::client::{RemoteStatus, SubmitResponse};
use crate::error::{Error, Result};
use crate::extraction::{CompletionBackend, ExtractionSchema};
use crate::indexing::IndexingService;
use crate::orchestrator::{BatterySession, QueryService, INSIGHT_PROMPTS};
use crate::types::{InsightReport, RepositoryRef};

/// Indexing service replaying a fixed sequence of raw statuses.
///
/// The last status repeats once the sequence is exhausted.
pub struct ScriptedIndexingService {
    statuses: Vec<String>,
    status_calls: AtomicUsize,
    submissions: AtomicUsize,
    failing_status: Option<u16>,
}

impl ScriptedIndexingService {
    pub fn new(statuses: &[&str]) -> Self {
        Self {
            statuses: statuses.iter().map(|s| s.to_string()).collect(),
            status_calls: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
            failing_status: None,
        }
    }

    /// Answer every status call with HTTP `status`
    pub fn failing_status(mut self, status: u16) -> Self {
        self.failing_status = Some(status);
        self
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexingService for ScriptedIndexingService {
    async fn submit(&self, repo: &RepositoryRef, creds: &UserCredentials) -> Result<SubmitResponse> {
        creds.ensure_present()?;
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(SubmitResponse {
            response: Some("started repo processing".to_string()),
            status_endpoint: Some(format!("/repositories/{}", repo.encoded_status_key())),
        })
    }

    async fn status(&self, repo: &RepositoryRef, creds: &UserCredentials) -> Result<RemoteStatus> {
        creds.ensure_present()?;
        let call = self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.failing_status {
            return Err(Error::upstream("indexing service", status, "scripted failure"));
        }
        let raw = self
            .statuses
            .get(call)
            .or_else(|| self.statuses.last())
            .cloned()
            .unwrap_or_default();
        Ok(RemoteStatus {
            status: raw,
            repository: Some(repo.full_name.clone()),
            branch: Some(repo.branch.clone()),
            files_processed: Some(call as u64),
            num_files: Some(10),
            sha: None,
        })
    }
}

/// A query observed by [`ScriptedQueryService`]
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub session_id: String,
    pub repository: RepositoryRef,
    pub text: String,
}

/// Query service answering `answer:<prompt id>` for battery prompts.
pub struct ScriptedQueryService {
    calls: Mutex<Vec<RecordedQuery>>,
    /// 1-based call number that fails, with its HTTP status
    fail_on: Option<(usize, u16)>,
    delay: Option<Duration>,
}

impl ScriptedQueryService {
    pub fn answering_with_prompt_ids() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
            delay: None,
        }
    }

    /// Fail the `call`-th query (1-based) with HTTP `status`
    pub fn failing_on_call(mut self, call: usize, status: u16) -> Self {
        self.fail_on = Some((call, status));
        self
    }

    /// Sleep before answering each query
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedQuery> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl QueryService for ScriptedQueryService {
    async fn query(&self, session: &BatterySession, text: &str, creds: &UserCredentials) -> Result<String> {
        creds.ensure_present()?;
        let call = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| Error::Transport("query log poisoned".into()))?;
            calls.push(RecordedQuery {
                session_id: session.session_id().to_string(),
                repository: session.repository().clone(),
                text: text.to_string(),
            });
            calls.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((fail_call, status)) = self.fail_on {
            if fail_call == call {
                return Err(Error::upstream("query service", status, "scripted failure"));
            }
        }

        let id = INSIGHT_PROMPTS
            .iter()
            .find(|p| p.text == text)
            .map(|p| p.id)
            .unwrap_or("adhoc");
        Ok(format!("answer:{}", id))
    }
}

/// Completion backend returning one canned reply.
pub struct StaticCompletionBackend {
    reply: std::result::Result<String, u16>,
    prompts: Mutex<Vec<String>>,
}

impl StaticCompletionBackend {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call with HTTP `status`
    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for StaticCompletionBackend {
    async fn complete(&self, prompt: &str, _schema: &ExtractionSchema) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(status) => Err(Error::upstream("extraction service", *status, "scripted failure")),
        }
    }
}

/// A fully valid report as the extraction service would send it
pub fn sample_report_json() -> serde_json::Value {
    serde_json::json!({
        "codeStructure": {
            "description": "A library crate with a thin HTTP server on top."
        },
        "complexityAnalysis": {
            "complexAreas": [
                {
                    "area": "src/jobs",
                    "complexity": 7,
                    "refactoringSuggestions": ["Split the task body", "Extract a store trait"]
                }
            ],
            "overallComplexity": 5.5
        },
        "documentationCoverage": {
            "wellDocumented": ["src/lib.rs", "README.md"],
            "needsAttention": ["src/jobs"],
            "overallCoverage": 64
        },
        "dependencyTracker": {
            "external": ["tokio", "serde"],
            "internal": ["core", "server"],
            "dependencyRelations": "server depends on core"
        },
        "codeHealthMetrics": {
            "codeQuality": 78,
            "testCoverage": 55.5,
            "securityVulnerabilities": [
                { "severity": "medium", "description": "Token compared without constant time" }
            ],
            "cyclomaticComplexity": 12,
            "codeDuplication": 4,
            "maintainabilityIndex": 71,
            "codeChurn": 230
        }
    })
}

/// [`sample_report_json`] as a typed report
pub fn sample_report() -> InsightReport {
    serde_json::from_value(sample_report_json()).expect("sample report is valid")
}
