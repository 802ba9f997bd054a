//! Authentication middleware for insight-server.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use insight_core::UserCredentials;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::state::AppState;

/// Header carrying the caller's repository-access token
pub const GITHUB_TOKEN_HEADER: &str = "X-Github-Token";

/// Authentication context extracted from request
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Credential forwarded on every upstream call made for this request
    pub credentials: UserCredentials,
}

/// Authentication error
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    MissingRepositoryToken,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (error, code) = match self {
            AuthError::MissingToken => ("Missing authentication token", "MISSING_TOKEN"),
            AuthError::InvalidToken => ("Invalid authentication token", "INVALID_TOKEN"),
            AuthError::MissingRepositoryToken => (
                "Missing repository access token",
                "MISSING_REPOSITORY_TOKEN",
            ),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        });

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Authentication middleware for axum
///
/// Rejects the request before any handler runs unless it carries the service
/// token and a non-blank repository-access token.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token_str = match request.headers().get("Authorization") {
        Some(value) => value.to_str().map_err(|_| AuthError::InvalidToken)?,
        None => return Err(AuthError::MissingToken),
    };

    // Remove "Bearer " prefix if present
    let token_str = token_str.trim_start_matches("Bearer ").trim();

    let token_bytes = STANDARD
        .decode(token_str)
        .map_err(|_| AuthError::InvalidToken)?;

    if !state.service_token.verify(&token_bytes) {
        debug!("Rejected request with unknown service token");
        return Err(AuthError::InvalidToken);
    }

    let github_token = request
        .headers()
        .get(GITHUB_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    let credentials =
        UserCredentials::require(github_token).map_err(|_| AuthError::MissingRepositoryToken)?;

    request.extensions_mut().insert(AuthContext { credentials });

    Ok(next.run(request).await)
}
