//! Error types shared across the matchmaking core.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the match engine, queue store, session manager, and
/// chat server selector.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    #[error("service is in maintenance mode")]
    Maintenance,

    #[error("not found: {0}")]
    NotFound(String),

    /// Recovered locally by callers that catch it (e.g. the match engine
    /// reinserting a popped id and continuing the scan); exposed as a
    /// variant so store implementations have somewhere to report it, not
    /// meant to escape to an HTTP response in normal operation.
    #[error("inconsistent store state: {0}")]
    Inconsistent(String),
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for AppError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Inconsistent(format!("malformed JSON record: {err}"))
    }
}

impl AppError {
    /// The HTTP status this error kind maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DiscoveryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Maintenance => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Inconsistent(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        (status, Json(json!({ "state": "ERROR", "message": message }))).into_response()
    }
}
