//! HTTP error type for civic-ie
//!
//! Every failure leaves the API as `{"error": {"code", "message"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::ServiceError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409), e.g. changing the payload of an answered element
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request understood but refused (422)
    #[error("{code}: {message}")]
    Unprocessable { code: &'static str, message: String },

    /// Storage busy after retries (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = err.kind();
        match err {
            ServiceError::Storage(civic_common::Error::NotFound(msg)) => ApiError::NotFound(msg),
            ServiceError::Storage(civic_common::Error::Conflict(msg)) => ApiError::Conflict(msg),
            ServiceError::Storage(civic_common::Error::TransientStorage(msg)) => {
                ApiError::Unavailable(msg)
            }
            ServiceError::Storage(civic_common::Error::InvalidInput(message)) => {
                ApiError::Unprocessable { code, message }
            }
            ServiceError::Storage(other) => {
                tracing::error!(error = %other, "Storage failure");
                ApiError::Internal(other.to_string())
            }
            ServiceError::Payload(err) => ApiError::Unprocessable {
                code,
                message: err.message,
            },
            ServiceError::Rejected(issue) => ApiError::Unprocessable {
                code,
                message: issue.message,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NotFound", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BadRequest", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", msg),
            ApiError::Unprocessable { code, message } => {
                (StatusCode::UNPROCESSABLE_ENTITY, code, message)
            }
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "TransientStorage", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "Fatal", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
