//! HTTP mapping for pipeline errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use insight_core::Error;
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

/// Error returned by route handlers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: &'static str,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code: "BAD_REQUEST",
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            code: "NOT_FOUND",
        }
    }

    /// Map a pipeline error, hiding upstream detail behind `failure`.
    ///
    /// Caller-facing kinds keep their own message; everything that went
    /// wrong past the request boundary becomes a 500 with the generic text.
    pub fn from_core(err: Error, failure: &str) -> Self {
        if !err.is_client_error() && !err.is_schema_validation() {
            error!(error = %err, "{}", failure);
            return Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: failure.to_string(),
                code: "UPSTREAM_FAILURE",
            };
        }

        match err.root() {
            Error::Auth(message) => Self {
                status: StatusCode::UNAUTHORIZED,
                message: message.clone(),
                code: "UNAUTHORIZED",
            },
            Error::ClientInput(message) => Self::bad_request(message.clone()),
            Error::NotFound(message) => Self::not_found(format!("Not found: {}", message)),
            Error::SchemaValidation(message) => {
                warn!(error = %err, "Extraction reply rejected");
                Self {
                    status: StatusCode::UNPROCESSABLE_ENTITY,
                    message: format!("Insight report failed validation: {}", message),
                    code: "SCHEMA_VALIDATION",
                }
            }
            other => {
                warn!(error = %other, "Unmapped caller error");
                Self::bad_request(other.to_string())
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}
