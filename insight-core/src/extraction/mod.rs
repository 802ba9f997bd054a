//! Structured extraction.
//!
//! Sends the combined battery text plus the [`InsightReport`] schema to a
//! completion backend and turns the reply into a validated report. The reply
//! is parsed and checked in one place: any missing section, wrong type or
//! out-of-bound number is an [`Error::SchemaValidation`], and no partial
//! report ever leaves this module.

use async_trait::async_trait;
use std::sync::{Arc, LazyLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::InsightReport;

/// Top-level sections every reply must contain
pub const REQUIRED_SECTIONS: [&str; 5] = [
    "codeStructure",
    "complexityAnalysis",
    "documentationCoverage",
    "dependencyTracker",
    "codeHealthMetrics",
];

/// Named JSON schema handed to the completion backend
#[derive(Debug, Clone)]
pub struct ExtractionSchema {
    pub name: &'static str,
    pub schema: serde_json::Value,
}

static INSIGHT_SCHEMA: LazyLock<ExtractionSchema> = LazyLock::new(|| ExtractionSchema {
    name: "insight_report",
    schema: serde_json::to_value(schemars::schema_for!(InsightReport))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object", "required": REQUIRED_SECTIONS })),
});

/// Schema describing [`InsightReport`]
pub fn insight_schema() -> &'static ExtractionSchema {
    &INSIGHT_SCHEMA
}

/// Completion capability used for extraction.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Return the raw reply text for `prompt`, constrained by `schema`.
    async fn complete(&self, prompt: &str, schema: &ExtractionSchema) -> Result<String>;
}

/// Turns combined battery text into a validated [`InsightReport`]
pub struct Extractor {
    backend: Arc<dyn CompletionBackend>,
}

impl Extractor {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Extract a report; transport and service failures pass through
    /// unchanged, shape and bound failures become `SchemaValidation`.
    pub async fn extract(&self, combined: &str, cancel: &CancellationToken) -> Result<InsightReport> {
        let prompt = format!(
            "Process the following information to generate insights: {}",
            combined
        );

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            reply = self.backend.complete(&prompt, insight_schema()) => reply?,
        };
        debug!(chars = reply.len(), "Extraction reply received");

        match parse_report(&reply) {
            Ok(report) => {
                info!("Extraction produced a valid report");
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Extraction reply rejected");
                Err(e)
            }
        }
    }
}

/// Parse and validate a raw reply.
pub fn parse_report(reply: &str) -> Result<InsightReport> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(reply))
        .map_err(|e| Error::schema(format!("reply is not valid JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| Error::schema("reply must be a JSON object"))?;
    for section in REQUIRED_SECTIONS {
        match object.get(section) {
            Some(serde_json::Value::Object(_)) => {}
            Some(_) => return Err(Error::schema(format!("{} must be an object", section))),
            None => return Err(Error::schema(format!("missing section {}", section))),
        }
    }

    let report: InsightReport =
        serde_json::from_value(value).map_err(|e| Error::schema(e.to_string()))?;
    report.validate()?;
    Ok(report)
}

/// Accept replies wrapped in a Markdown code fence
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_report_json, StaticCompletionBackend};

    #[tokio::test]
    async fn test_extract_valid_reply() {
        let backend = Arc::new(StaticCompletionBackend::replying(sample_report_json().to_string()));
        let extractor = Extractor::new(backend.clone());

        let report = extractor
            .extract("combined notes", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.code_health_metrics.code_quality, 78.0);
        assert!(report.documentation_coverage.well_documented.contains("src/lib.rs"));
        assert!(backend.prompts()[0].ends_with("combined notes"));
    }

    #[test]
    fn test_missing_section_is_schema_error() {
        let mut json = sample_report_json();
        json.as_object_mut().unwrap().remove("codeHealthMetrics");

        let err = parse_report(&json.to_string()).unwrap_err();
        assert!(err.is_schema_validation());
        assert!(err.to_string().contains("codeHealthMetrics"));
    }

    #[test]
    fn test_missing_nested_field_is_schema_error() {
        let mut json = sample_report_json();
        json["codeHealthMetrics"].as_object_mut().unwrap().remove("codeChurn");

        let err = parse_report(&json.to_string()).unwrap_err();
        assert!(err.is_schema_validation());
        assert!(err.to_string().contains("codeChurn"));
    }

    #[test]
    fn test_out_of_bound_field_is_schema_error() {
        for (field, value) in [
            ("codeQuality", 101.0),
            ("testCoverage", -0.5),
            ("codeDuplication", 250.0),
            ("maintainabilityIndex", -3.0),
            ("cyclomaticComplexity", -1.0),
            ("codeChurn", -10.0),
        ] {
            let mut json = sample_report_json();
            json["codeHealthMetrics"][field] = serde_json::json!(value);
            let err = parse_report(&json.to_string()).unwrap_err();
            assert!(err.is_schema_validation(), "{} accepted", field);
        }

        let mut json = sample_report_json();
        json["documentationCoverage"]["overallCoverage"] = serde_json::json!(120);
        assert!(parse_report(&json.to_string()).unwrap_err().is_schema_validation());
    }

    #[test]
    fn test_unknown_severity_is_schema_error() {
        let mut json = sample_report_json();
        json["codeHealthMetrics"]["securityVulnerabilities"][0]["severity"] = serde_json::json!("severe");
        assert!(parse_report(&json.to_string()).unwrap_err().is_schema_validation());
    }

    #[test]
    fn test_non_json_reply_is_schema_error() {
        let err = parse_report("I could not analyse this repository.").unwrap_err();
        assert!(err.is_schema_validation());
    }

    #[test]
    fn test_fenced_reply_is_accepted() {
        let reply = format!("```json\n{}\n```", sample_report_json());
        assert!(parse_report(&reply).is_ok());
    }

    #[tokio::test]
    async fn test_backend_error_passes_through() {
        let extractor = Extractor::new(Arc::new(StaticCompletionBackend::failing(502)));
        let err = extractor
            .extract("notes", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(!err.is_schema_validation());
        assert_eq!(err.status_code(), Some(502));
    }

    #[test]
    fn test_schema_names_every_section() {
        let schema = insight_schema();
        let text = schema.schema.to_string();
        for section in REQUIRED_SECTIONS {
            assert!(text.contains(section), "schema lacks {}", section);
        }
    }
}
