//! Error types for insight-core.

use thiserror::Error;

/// Result type alias using insight-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for insight operations
#[derive(Error, Debug)]
pub enum Error {
    // Caller errors
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    ClientInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Remote service errors
    #[error("{service} returned HTTP {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    /// A battery query failed; wraps the query service's error unchanged.
    #[error("prompt '{prompt_id}' failed: {source}")]
    Prompt {
        prompt_id: &'static str,
        #[source]
        source: Box<Error>,
    },

    // Control flow
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("operation cancelled")]
    Cancelled,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an upstream (non-2xx) error
    pub fn upstream(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            status,
            body: body.into(),
        }
    }

    /// Tag an error with the battery prompt that produced it
    pub fn for_prompt(prompt_id: &'static str, source: Error) -> Self {
        Self::Prompt {
            prompt_id,
            source: Box::new(source),
        }
    }

    /// Create a schema validation error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaValidation(message.into())
    }

    /// Create a timeout error
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout {
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// The underlying error with any prompt tagging removed
    pub fn root(&self) -> &Error {
        match self {
            Self::Prompt { source, .. } => source.root(),
            other => other,
        }
    }

    /// Prompt id this error was tagged with, if any
    pub fn prompt_id(&self) -> Option<&'static str> {
        match self {
            Self::Prompt { prompt_id, .. } => Some(*prompt_id),
            _ => None,
        }
    }

    /// HTTP status preserved from an upstream failure
    pub fn status_code(&self) -> Option<u16> {
        match self.root() {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this error is a schema validation failure
    pub fn is_schema_validation(&self) -> bool {
        matches!(self.root(), Self::SchemaValidation(_))
    }

    /// Check if this error was caused by the caller (auth or input)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.root(),
            Self::Auth(_) | Self::ClientInput(_) | Self::NotFound(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Transport(format!("request timed out: {}", err));
        }
        Self::Transport(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
