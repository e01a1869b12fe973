//! Error types for the cache subsystem
//!
//! Provides unified error handling using thiserror. Cache misses are never
//! errors; they surface as `None`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Collaborator Errors ==
/// The scoring collaborator failed to produce a candidate list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("scoring failed: {0}")]
pub struct ScoringError(pub String);

/// The durable status store rejected a write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("status store write failed: {0}")]
pub struct StoreError(pub String);

/// The broadcaster could not deliver an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("event delivery failed: {0}")]
pub struct DeliveryError(pub String);

// == Cache Error Enum ==
/// Unified error type for the cache subsystem.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A zero TTL was supplied
    #[error("TTL must be greater than zero")]
    InvalidTtl,

    /// An invalidation pattern did not compile
    #[error("Invalid key pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Query string missing or malformed
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl CacheError {
    /// Returns true for failures raised by an external collaborator.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            CacheError::Scoring(_) | CacheError::Store(_) | CacheError::Delivery(_)
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = if self.is_collaborator_failure() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::BAD_REQUEST
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache subsystem.
pub type Result<T> = std::result::Result<T, CacheError>;
