//! HTTP transport to the remote indexing and query services.
//!
//! The client fails fast: every call carries the service credential and the
//! caller's repository-access credential, and any non-2xx response becomes an
//! [`Error::Upstream`] with the status preserved. Nothing is retried here.
//!
//! # Usage
//!
//! ```rust,no_run
//! use insight_core::client::RemoteClient;
//! use insight_core::{InsightConfig, IndexingService, RepositoryRef, UserCredentials};
//!
//! #[tokio::main]
//! async fn main() -> insight_core::Result<()> {
//!     let client = RemoteClient::from_config(&InsightConfig::load()?)?;
//!     let creds = UserCredentials::new("ghp_...");
//!     let status = client.status(&RepositoryRef::github("acme/widgets"), &creds).await?;
//!     println!("{}", status.status);
//!     Ok(())
//! }
//! ```

mod completion;

pub use completion::OpenAiCompletion;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::auth::UserCredentials;
use crate::config::InsightConfig;
use crate::error::{Error, Result};
use crate::indexing::IndexingService;
use crate::orchestrator::{BatterySession, QueryService};
use crate::types::RepositoryRef;

const INDEXING_SERVICE: &str = "indexing service";
const QUERY_SERVICE: &str = "query service";

/// Build the shared reqwest client with per-call deadlines
pub(crate) fn http_client(config: &InsightConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a response into `T`, or into a typed upstream error
pub(crate) async fn decode_response<T: DeserializeOwned>(
    service: &'static str,
    resp: reqwest::Response,
) -> Result<T> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        debug!(service, status = status.as_u16(), "Upstream call failed");
        return Err(Error::upstream(service, status.as_u16(), body));
    }
    Ok(serde_json::from_str(&body)?)
}

/// Client for the indexing and query service
#[derive(Clone)]
pub struct RemoteClient {
    /// Base URL, without trailing slash
    base_url: String,
    /// Service credential
    api_key: Option<String>,
    /// HTTP client
    client: reqwest::Client,
}

impl RemoteClient {
    /// Create a client from explicit parts
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    /// Create a client from configuration
    pub fn from_config(config: &InsightConfig) -> Result<Self> {
        Ok(Self::new(
            config.indexing.base_url.clone(),
            config.indexing.api_key.clone(),
            http_client(config)?,
        ))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // HTTP Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn authorized(
        &self,
        method: reqwest::Method,
        path: &str,
        creds: &UserCredentials,
    ) -> Result<reqwest::RequestBuilder> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Auth("missing indexing service API key".into()))?;
        creds.ensure_present()?;

        let url = format!("{}{}", self.base_url, path);
        debug!("Remote request: {} {}", method, url);

        Ok(self
            .client
            .request(method, &url)
            .bearer_auth(api_key)
            .header("X-Github-Token", creds.github_token()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        service: &'static str,
        path: &str,
        creds: &UserCredentials,
    ) -> Result<T> {
        let req = self.authorized(reqwest::Method::GET, path, creds)?;
        decode_response(service, req.send().await?).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        service: &'static str,
        path: &str,
        body: &B,
        creds: &UserCredentials,
    ) -> Result<T> {
        let req = self.authorized(reqwest::Method::POST, path, creds)?.json(body);
        decode_response(service, req.send().await?).await
    }
}

#[async_trait]
impl IndexingService for RemoteClient {
    async fn submit(&self, repo: &RepositoryRef, creds: &UserCredentials) -> Result<SubmitResponse> {
        let body = SubmitRequest::from(repo);
        self.post(INDEXING_SERVICE, "/repositories", &body, creds).await
    }

    async fn status(&self, repo: &RepositoryRef, creds: &UserCredentials) -> Result<RemoteStatus> {
        let path = format!("/repositories/{}", repo.encoded_status_key());
        self.get(INDEXING_SERVICE, &path, creds).await
    }
}

#[async_trait]
impl QueryService for RemoteClient {
    async fn query(
        &self,
        session: &BatterySession,
        text: &str,
        creds: &UserCredentials,
    ) -> Result<String> {
        let body = QueryRequest {
            messages: vec![QueryMessage {
                content: text.to_string(),
                role: "user".to_string(),
            }],
            repositories: vec![SubmitRequest::from(session.repository())],
            session_id: session.session_id().to_string(),
        };
        let resp: QueryResponse = self.post(QUERY_SERVICE, "/query", &body, creds).await?;
        Ok(resp.message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Repository payload used by submission and queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub remote: String,
    pub repository: String,
    pub branch: String,
}

impl From<&RepositoryRef> for SubmitRequest {
    fn from(repo: &RepositoryRef) -> Self {
        Self {
            remote: repo.remote.as_str().to_string(),
            repository: repo.full_name.clone(),
            branch: repo.branch.clone(),
        }
    }
}

/// Indexing submission result, mirrored back to callers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_endpoint: Option<String>,
}

/// Raw status payload returned by the indexing service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    pub status: String,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub files_processed: Option<u64>,
    #[serde(default)]
    pub num_files: Option<u64>,
    #[serde(default)]
    pub sha: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    messages: Vec<QueryMessage>,
    repositories: Vec<SubmitRequest>,
    session_id: String,
}

#[derive(Debug, Serialize)]
struct QueryMessage {
    content: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: Option<&str>) -> RemoteClient {
        RemoteClient::new(
            "http://127.0.0.1:9/v2/",
            api_key.map(str::to_string),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(client(Some("k")).base_url, "http://127.0.0.1:9/v2");
    }

    #[test]
    fn test_submit_request_from_repository() {
        let repo = RepositoryRef::github("acme/widgets");
        let body = serde_json::to_value(SubmitRequest::from(&repo)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"remote": "github", "repository": "acme/widgets", "branch": "main"})
        );
    }

    #[test]
    fn test_query_request_shape() {
        let repo = RepositoryRef::github("acme/widgets");
        let body = QueryRequest {
            messages: vec![QueryMessage {
                content: "hi".into(),
                role: "user".into(),
            }],
            repositories: vec![SubmitRequest::from(&repo)],
            session_id: "s-1".into(),
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["sessionId"], "s-1");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["repositories"][0]["repository"], "acme/widgets");
    }

    #[test]
    fn test_remote_status_tolerates_missing_progress() {
        let status: RemoteStatus =
            serde_json::from_str(r#"{"status":"processing","filesProcessed":3}"#).unwrap();
        assert_eq!(status.status, "processing");
        assert_eq!(status.files_processed, Some(3));
        assert!(status.num_files.is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_network() {
        let repo = RepositoryRef::github("acme/widgets");
        let err = client(None)
            .submit(&repo, &UserCredentials::new("ghp_x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_missing_user_token_fails_before_network() {
        let repo = RepositoryRef::github("acme/widgets");
        let err = client(Some("key"))
            .status(&repo, &UserCredentials::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        let repo = RepositoryRef::github("acme/widgets");
        let err = client(Some("key"))
            .status(&repo, &UserCredentials::new("ghp_x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
