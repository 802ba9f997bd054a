//! Pipeline configuration.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (`GREPTILE_API_KEY`, `OPENAI_API_KEY`, `INSIGHT_*`)
//! 2. Config file (`$INSIGHT_CONFIG`, `$INSIGHT_HOME/config.toml` or `~/.repo-insight/config.toml`)
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{Remote, DEFAULT_BRANCH};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Indexing and query service settings
    pub indexing: IndexingConfig,

    /// Extraction (completion) service settings
    pub extraction: ExtractionConfig,

    /// Transport settings shared by every remote call
    pub http: HttpConfig,

    /// Background job settings
    pub jobs: JobsConfig,

    /// Report cache settings
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Base URL of the indexing/query service
    pub base_url: String,

    /// Service credential
    pub api_key: Option<String>,

    /// Remote provider assumed for bare `owner/name` input
    pub default_remote: Remote,

    /// Branch assumed when the caller does not name one
    pub default_branch: String,

    /// Delay between status checks in the polling loop (default: 20)
    pub poll_interval_secs: u64,

    /// Status checks before the polling loop gives up (default: 90)
    pub max_polls: u32,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.greptile.com/v2".to_string(),
            api_key: None,
            default_remote: Remote::Github,
            default_branch: DEFAULT_BRANCH.to_string(),
            poll_interval_secs: 20,
            max_polls: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Base URL of the OpenAI-compatible completion service
    pub base_url: String,

    /// Completion service credential
    pub api_key: Option<String>,

    /// Model used for structured extraction
    pub model: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Deadline for each remote call in seconds (default: 120)
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds (default: 10)
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Deadline for a whole job in seconds (default: 900)
    pub timeout_secs: u64,

    /// How long finished jobs are kept in seconds (default: 3600)
    pub retention_secs: u64,

    /// Interval of the retention sweep in seconds (default: 300)
    pub sweep_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 900,
            retention_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Report lifetime in seconds; `None` keeps reports until refreshed
    pub ttl_secs: Option<u64>,
}

impl InsightConfig {
    /// Directory holding configuration and runtime files
    pub fn home_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("INSIGHT_HOME") {
            return PathBuf::from(dir);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".repo-insight")
    }

    /// Config file location honouring `INSIGHT_CONFIG`
    pub fn default_path() -> PathBuf {
        std::env::var("INSIGHT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::home_dir().join("config.toml"))
    }

    /// Load from the default location, apply env overrides, validate
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file(&Self::default_path())?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file; a missing file yields defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override credentials and endpoints from the environment
    pub fn apply_env(&mut self) {
        if let Some(key) = env_value("GREPTILE_API_KEY") {
            self.indexing.api_key = Some(key);
        }
        if let Some(url) = env_value("INSIGHT_INDEXING_URL") {
            self.indexing.base_url = url;
        }
        if let Some(key) = env_value("OPENAI_API_KEY") {
            self.extraction.api_key = Some(key);
        }
        if let Some(url) = env_value("INSIGHT_EXTRACTION_URL") {
            self.extraction.base_url = url;
        }
        if let Some(model) = env_value("INSIGHT_EXTRACTION_MODEL") {
            self.extraction.model = model;
        }
    }

    /// Reject values that would stall or spin the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.indexing.base_url.trim().is_empty() {
            return Err(Error::Config("indexing.base_url must not be empty".into()));
        }
        if self.extraction.base_url.trim().is_empty() {
            return Err(Error::Config("extraction.base_url must not be empty".into()));
        }
        if self.indexing.default_branch.trim().is_empty() {
            return Err(Error::Config("indexing.default_branch must not be empty".into()));
        }
        let non_zero = [
            ("indexing.poll_interval_secs", self.indexing.poll_interval_secs),
            ("indexing.max_polls", u64::from(self.indexing.max_polls)),
            ("http.request_timeout_secs", self.http.request_timeout_secs),
            ("http.connect_timeout_secs", self.http.connect_timeout_secs),
            ("jobs.timeout_secs", self.jobs.timeout_secs),
            ("jobs.sweep_interval_secs", self.jobs.sweep_interval_secs),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.indexing.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http.connect_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.jobs.timeout_secs)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.jobs.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.jobs.sweep_interval_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache.ttl_secs.map(Duration::from_secs)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InsightConfig::default();
        assert_eq!(config.indexing.poll_interval_secs, 20);
        assert_eq!(config.indexing.default_branch, "main");
        assert_eq!(config.indexing.default_remote, Remote::Github);
        assert_eq!(config.extraction.model, "gpt-4o");
        assert!(config.cache_ttl().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = InsightConfig::from_toml(
            r#"
            [indexing]
            base_url = "http://localhost:9000"
            poll_interval_secs = 5

            [cache]
            ttl_secs = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.indexing.base_url, "http://localhost:9000");
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.indexing.max_polls, 90);
        assert_eq!(config.http.request_timeout_secs, 120);
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = InsightConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.jobs.timeout_secs, 900);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = InsightConfig::from_toml("[indexing\nbase_url = 1").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = InsightConfig::default();
        config.indexing.poll_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }
}
