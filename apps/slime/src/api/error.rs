//! API error type and its HTTP mapping.

use crate::orchestrator::TurnError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("a turn is already in progress")]
    Busy,

    #[error("{0}")]
    Validation(String),

    #[error("missing or invalid server key")]
    Unauthorized,

    #[error("too many requests")]
    RateLimited,

    /// The classifier failed; the apology was logged. The cause stays in
    /// the server log.
    #[error("classification failed")]
    Upstream,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::Busy => ApiError::Busy,
            TurnError::EmptyInput => ApiError::Validation(e.to_string()),
            TurnError::Storage(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Busy => (StatusCode::CONFLICT, "BUSY"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            ApiError::Upstream => (StatusCode::BAD_GATEWAY, "CLASSIFIER_FAILED"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            code: code.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
