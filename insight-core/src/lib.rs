//! insight-core - Core library for Repo Insight
//!
//! This crate turns an indexed source repository into a structured
//! [`InsightReport`]. It is shared between the `insight` CLI and
//! `insight-server`:
//!
//! - **client**: HTTP transport to the indexing, query and extraction services
//! - **indexing**: indexing submission and status state machine
//! - **orchestrator**: the fixed, ordered prompt battery
//! - **extraction**: schema-constrained extraction and validation
//! - **jobs**: background insight jobs and their store
//! - **cache**: per-repository report cache
//! - **auth**: service token and per-user credentials
//! - **config**: layered configuration

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod extraction;
pub mod indexing;
pub mod jobs;
pub mod orchestrator;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use auth::{ServiceToken, UserCredentials};
pub use cache::ReportCache;
pub use client::{OpenAiCompletion, RemoteClient};
pub use config::InsightConfig;
pub use error::{Error, Result};
pub use extraction::{CompletionBackend, Extractor};
pub use indexing::{IndexingService, IndexingTracker};
pub use jobs::{InMemoryJobStore, InsightJob, InsightPipeline, JobStatus, JobStore, JobTracker};
pub use orchestrator::{BatterySession, InsightPrompt, QueryOrchestrator, QueryService, INSIGHT_PROMPTS};
pub use types::{IndexingStatus, InsightReport, Remote, RepositoryRef};
