//! Server configuration.

use insight_core::InsightConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_BIND: &str = "127.0.0.1:6780";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// `[server]` table of the shared config file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerSection {
    bind: Option<String>,
    log_format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerFile {
    server: ServerSection,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to configuration file
    pub config_path: PathBuf,
    /// Address the REST API listens on
    pub bind: SocketAddr,
    /// Service token file path
    pub service_token_file: PathBuf,
    pub log_format: LogFormat,
    /// Pipeline settings shared with the CLI
    pub pipeline: InsightConfig,
}

impl Config {
    /// Load configuration from file, environment and defaults
    ///
    /// Directory layout:
    /// ```text
    /// ~/.repo-insight/
    /// ├── config.toml           # Pipeline and [server] settings
    /// └── server/
    ///     └── service-token     # Bearer token for API callers
    /// ```
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&InsightConfig::home_dir(), &InsightConfig::default_path())?;

        if let Ok(bind) = std::env::var("INSIGHT_BIND") {
            config.bind = bind.trim().parse()?;
        }
        if let Ok(format) = std::env::var("INSIGHT_LOG_FORMAT") {
            config.log_format = match format.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            };
        }
        config.pipeline.apply_env();
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Build from an explicit data directory and config file, without env overrides
    pub fn load_from(data_dir: &Path, config_path: &Path) -> anyhow::Result<Self> {
        let server_dir = data_dir.join("server");
        std::fs::create_dir_all(&server_dir)?;

        let (pipeline, server) = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let file: ServerFile = toml::from_str(&content)?;
            (InsightConfig::from_toml(&content)?, file.server)
        } else {
            (InsightConfig::default(), ServerSection::default())
        };

        let bind = server.bind.as_deref().unwrap_or(DEFAULT_BIND).parse()?;

        Ok(Self {
            config_path: config_path.to_path_buf(),
            bind,
            service_token_file: server_dir.join("service-token"),
            log_format: server.log_format.unwrap_or_default(),
            pipeline,
        })
    }
}
