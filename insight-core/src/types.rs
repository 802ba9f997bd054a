//! Shared types for insight-core.
//!
//! These types are used by the pipeline components, the server and the CLI.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};

/// Branch used when the caller does not name one
pub const DEFAULT_BRANCH: &str = "main";

// ─────────────────────────────────────────────────────────────────────────────
// Repository Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Remote provider hosting a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Remote {
    Github,
    Gitlab,
}

impl Remote {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Remote::Github => "github",
            Remote::Gitlab => "gitlab",
        }
    }
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a remote-indexable repository.
///
/// Two references are equal iff remote, full name and branch all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRef {
    pub remote: Remote,
    /// "owner/name"
    pub full_name: String,
    pub branch: String,
}

impl RepositoryRef {
    /// Build a reference from already-validated parts
    pub fn new(remote: Remote, full_name: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            remote,
            full_name: full_name.into(),
            branch: branch.into(),
        }
    }

    /// GitHub repository on the default branch
    pub fn github(full_name: impl Into<String>) -> Self {
        Self::new(Remote::Github, full_name, DEFAULT_BRANCH)
    }

    /// Parse caller input of the form `owner/name` or `owner/name@branch`.
    pub fn parse(input: &str, remote: Remote, default_branch: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::ClientInput("repository is required".into()));
        }

        let (name, branch) = match input.split_once('@') {
            Some((name, branch)) => (name.trim(), branch.trim()),
            None => (input, default_branch),
        };

        if branch.is_empty() || branch.chars().any(char::is_whitespace) {
            return Err(Error::ClientInput(format!("invalid branch in '{}'", input)));
        }

        let mut parts = name.split('/');
        let valid = match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), None) => {
                !owner.is_empty()
                    && !repo.is_empty()
                    && !name.chars().any(char::is_whitespace)
            }
            _ => false,
        };
        if !valid {
            return Err(Error::ClientInput(format!(
                "repository must be 'owner/name', got '{}'",
                input
            )));
        }

        Ok(Self::new(remote, name, branch))
    }

    /// Key used by the indexing service: `remote:branch:owner/name`
    pub fn status_key(&self) -> String {
        format!("{}:{}:{}", self.remote, self.branch, self.full_name)
    }

    /// [`status_key`](Self::status_key) encoded as a single URL path segment
    pub fn encoded_status_key(&self) -> String {
        urlencoding::encode(&self.status_key()).into_owned()
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.full_name, self.branch)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Indexing Status
// ─────────────────────────────────────────────────────────────────────────────

/// Local view of a repository's remote indexing progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingStatus {
    NotStarted,
    Submitted,
    Indexing,
    Completed,
    Error,
}

impl IndexingStatus {
    /// Translate the indexing service's raw status vocabulary.
    ///
    /// Unknown values map to `Error`, never to `Completed`.
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "not started" | "notstarted" => IndexingStatus::NotStarted,
            "submitted" | "queued" => IndexingStatus::Submitted,
            "cloning" | "processing" | "indexing" => IndexingStatus::Indexing,
            "completed" | "complete" => IndexingStatus::Completed,
            _ => IndexingStatus::Error,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexingStatus::NotStarted => "not_started",
            IndexingStatus::Submitted => "submitted",
            IndexingStatus::Indexing => "indexing",
            IndexingStatus::Completed => "completed",
            IndexingStatus::Error => "error",
        }
    }

    /// Position on the success path, `None` for `Error`.
    pub fn progress_rank(&self) -> Option<u8> {
        match self {
            IndexingStatus::NotStarted => Some(0),
            IndexingStatus::Submitted => Some(1),
            IndexingStatus::Indexing => Some(2),
            IndexingStatus::Completed => Some(3),
            IndexingStatus::Error => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IndexingStatus::Completed | IndexingStatus::Error)
    }
}

impl fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Insight Report
// ─────────────────────────────────────────────────────────────────────────────

/// Structured, schema-validated analysis of a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsightReport {
    pub code_structure: CodeStructure,
    pub complexity_analysis: ComplexityAnalysis,
    pub documentation_coverage: DocumentationCoverage,
    pub dependency_tracker: DependencyTracker,
    pub code_health_metrics: CodeHealthMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeStructure {
    /// Explanation of the code structure
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityAnalysis {
    pub complex_areas: Vec<ComplexArea>,
    pub overall_complexity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplexArea {
    pub area: String,
    pub complexity: f64,
    pub refactoring_suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationCoverage {
    pub well_documented: BTreeSet<String>,
    pub needs_attention: BTreeSet<String>,
    #[schemars(range(min = 0, max = 100))]
    pub overall_coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DependencyTracker {
    pub external: Vec<String>,
    pub internal: Vec<String>,
    /// Relationships between dependencies
    pub dependency_relations: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeHealthMetrics {
    #[schemars(range(min = 0, max = 100))]
    pub code_quality: f64,
    #[schemars(range(min = 0, max = 100))]
    pub test_coverage: f64,
    pub security_vulnerabilities: Vec<SecurityVulnerability>,
    #[schemars(range(min = 0))]
    pub cyclomatic_complexity: f64,
    #[schemars(range(min = 0, max = 100))]
    pub code_duplication: f64,
    #[schemars(range(min = 0, max = 100))]
    pub maintainability_index: f64,
    #[schemars(range(min = 0))]
    pub code_churn: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SecurityVulnerability {
    pub severity: Severity,
    pub description: String,
}

/// Severity of a reported security vulnerability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl InsightReport {
    /// Check every numeric bound. The first violation fails the whole report.
    pub fn validate(&self) -> Result<()> {
        let complexity = &self.complexity_analysis;
        finite("complexityAnalysis.overallComplexity", complexity.overall_complexity)?;
        for (i, area) in complexity.complex_areas.iter().enumerate() {
            finite(&format!("complexityAnalysis.complexAreas[{}].complexity", i), area.complexity)?;
        }

        percent(
            "documentationCoverage.overallCoverage",
            self.documentation_coverage.overall_coverage,
        )?;

        let health = &self.code_health_metrics;
        percent("codeHealthMetrics.codeQuality", health.code_quality)?;
        percent("codeHealthMetrics.testCoverage", health.test_coverage)?;
        non_negative("codeHealthMetrics.cyclomaticComplexity", health.cyclomatic_complexity)?;
        percent("codeHealthMetrics.codeDuplication", health.code_duplication)?;
        percent("codeHealthMetrics.maintainabilityIndex", health.maintainability_index)?;
        non_negative("codeHealthMetrics.codeChurn", health.code_churn)?;

        Ok(())
    }
}

fn finite(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::schema(format!("{} must be a finite number", field)))
    }
}

fn percent(field: &str, value: f64) -> Result<()> {
    finite(field, value)?;
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::schema(format!(
            "{} must be within [0, 100], got {}",
            field, value
        )))
    }
}

fn non_negative(field: &str, value: f64) -> Result<()> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(Error::schema(format!("{} must be >= 0, got {}", field, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository_defaults_branch() {
        let repo = RepositoryRef::parse("acme/widgets", Remote::Github, DEFAULT_BRANCH).unwrap();
        assert_eq!(repo, RepositoryRef::github("acme/widgets"));
        assert_eq!(repo.branch, "main");
    }

    #[test]
    fn test_parse_repository_with_branch() {
        let repo = RepositoryRef::parse(" acme/widgets@develop ", Remote::Github, "main").unwrap();
        assert_eq!(repo.full_name, "acme/widgets");
        assert_eq!(repo.branch, "develop");
        assert_ne!(repo, RepositoryRef::github("acme/widgets"));
    }

    #[test]
    fn test_parse_repository_rejects_malformed() {
        for input in ["", "acme", "acme/", "/widgets", "acme/widgets/extra", "ac me/widgets", "acme/widgets@"] {
            let err = RepositoryRef::parse(input, Remote::Github, "main").unwrap_err();
            assert!(matches!(err, Error::ClientInput(_)), "accepted {:?}", input);
        }
    }

    #[test]
    fn test_status_key_encoding() {
        let repo = RepositoryRef::github("acme/widgets");
        assert_eq!(repo.status_key(), "github:main:acme/widgets");
        assert_eq!(repo.encoded_status_key(), "github%3Amain%3Aacme%2Fwidgets");
    }

    #[test]
    fn test_status_from_remote_vocabulary() {
        assert_eq!(IndexingStatus::from_remote("Not started"), IndexingStatus::NotStarted);
        assert_eq!(IndexingStatus::from_remote("submitted"), IndexingStatus::Submitted);
        assert_eq!(IndexingStatus::from_remote("CLONING"), IndexingStatus::Indexing);
        assert_eq!(IndexingStatus::from_remote("processing"), IndexingStatus::Indexing);
        assert_eq!(IndexingStatus::from_remote("completed"), IndexingStatus::Completed);
        assert_eq!(IndexingStatus::from_remote("failed"), IndexingStatus::Error);
    }

    #[test]
    fn test_status_unknown_maps_to_error() {
        for raw in ["", "done-ish", "COMPLETED?", "42"] {
            assert_eq!(IndexingStatus::from_remote(raw), IndexingStatus::Error);
        }
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&IndexingStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");
    }

    #[test]
    fn test_validate_rejects_out_of_bounds() {
        let mut report = crate::testing::sample_report();
        assert!(report.validate().is_ok());

        report.code_health_metrics.test_coverage = 100.5;
        let err = report.validate().unwrap_err();
        assert!(err.is_schema_validation());
        assert!(err.to_string().contains("testCoverage"));

        let mut report = crate::testing::sample_report();
        report.code_health_metrics.code_churn = -1.0;
        assert!(report.validate().unwrap_err().to_string().contains("codeChurn"));

        let mut report = crate::testing::sample_report();
        report.complexity_analysis.overall_complexity = f64::NAN;
        assert!(report.validate().is_err());
    }
}
