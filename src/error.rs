//! Error types for the cache and rate limiter
//!
//! Provides unified error handling using thiserror.
//!
//! [`StoreError`] describes a failed call to the distributed store. It never
//! reaches a cache or limiter caller: those paths downgrade it to a miss or a
//! local decision. [`CacheError`] covers the mistakes that are allowed to
//! propagate (bad policies, bad namespaces, bad configuration) plus the
//! HTTP-facing errors of the ops server.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Store Error Enum ==
/// Failure of a single distributed-store primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The call did not complete within the configured timeout
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered with an error or the connection failed
    #[error("store error: {0}")]
    Backend(String),

    /// The store is known to be unreachable
    #[error("store unavailable")]
    Unavailable,
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Result type for distributed-store primitives.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Cache Error Enum ==
/// Unified error type for the crate.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key or namespace not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate-limit policy that can never work (zero window or ceiling)
    #[error("Invalid rate-limit policy: {0}")]
    InvalidPolicy(String),

    /// Namespace name that would collide with key syntax
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    /// Unusable configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store failure surfaced from an internal fallible path
    #[error(transparent)]
    Store(#[from] StoreError),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_)
            | CacheError::InvalidPolicy(_)
            | CacheError::InvalidNamespace(_) => StatusCode::BAD_REQUEST,
            CacheError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, CacheError>;
