use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Closed set of failure kinds surfaced by the core.
///
/// Empty retrieval results are not errors; they select the fallback
/// generation branch instead.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid request fields. Nothing was attempted.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// A referenced document, unit or stored file does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// An embedding, generation, conversion or store call failed.
    #[error("upstream service error: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn upstream<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Upstream(err.to_string())
    }

    /// Whether a caller could reasonably retry the same request later.
    /// The core never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Upstream(_))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
