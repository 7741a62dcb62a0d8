//! Error types for the cache and its HTTP front
//!
//! Provides unified error handling using thiserror.

use std::error::Error as StdError;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Outcome of a failed cache lookup.
///
/// Cloneable so that a memoized failure can be handed to every reader.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Key never set, removed or evicted
    #[error("cache not found")]
    NotFound,

    /// Key was set but its TTL has lapsed
    #[error("cache expired")]
    Expired,

    /// Failure stored with `set_err`, returned verbatim until it expires
    #[error("{0}")]
    Cached(Arc<dyn StdError + Send + Sync>),
}

impl CacheError {
    /// Wraps a caller-supplied failure so it can be stored in a cache entry.
    pub fn cached<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        CacheError::Cached(Arc::from(err.into()))
    }

    /// Returns true for a memoized failure rather than an absent entry.
    pub fn is_cached(&self) -> bool {
        matches!(self, CacheError::Cached(_))
    }
}

// == Api Error Enum ==
/// Error type returned by the HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Lookup failure from the underlying cache
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Cache(CacheError::NotFound) | ApiError::Cache(CacheError::Expired) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Cache(CacheError::Cached(_)) => StatusCode::FAILED_DEPENDENCY,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the HTTP handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
