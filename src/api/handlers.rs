//! API Handlers
//!
//! HTTP request handlers for the diagnostics endpoints.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};

use crate::candidates::{CandidateCache, Recommender};
use crate::config::Config;
use crate::diagnostics::{Diagnostics, SystemSnapshot, UserSnapshot};
use crate::error::{CacheError, Result};
use crate::models::{HealthResponse, InvalidateQuery, InvalidateResponse};
use crate::presence::PresenceThrottle;

/// Owner of every cache component for the life of the process.
///
/// Cloning is cheap; all clones share the same caches.
#[derive(Debug, Clone)]
pub struct AppState {
    pub candidates: Arc<CandidateCache>,
    pub presence: Arc<PresenceThrottle>,
    pub recommender: Recommender,
    pub diagnostics: Diagnostics,
}

impl AppState {
    /// Wires the components around an existing candidate cache and throttle.
    pub fn new(candidates: CandidateCache, presence: PresenceThrottle) -> Self {
        let candidates = Arc::new(candidates);
        let presence = Arc::new(presence);
        Self {
            recommender: Recommender::new(candidates.clone()),
            diagnostics: Diagnostics::new(candidates.clone(), presence.clone()),
            candidates,
            presence,
        }
    }

    /// Creates a new AppState from configuration, rejecting invalid values.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            CandidateCache::new(config)?,
            PresenceThrottle::new(config)?,
        ))
    }
}

/// Handler for GET /stats
///
/// Returns occupancy of every component.
pub async fn stats_handler(State(state): State<AppState>) -> Json<SystemSnapshot> {
    Json(state.diagnostics.snapshot().await)
}

/// Handler for GET /stats/users/:user_id
///
/// Unknown users return the empty view, never an error.
pub async fn user_stats_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<UserSnapshot> {
    Json(state.diagnostics.user(&user_id).await)
}

/// Handler for DELETE /cache/candidates?pattern=...
///
/// Drops every candidate queue whose user id matches the pattern.
/// A missing or malformed query string is reported as a JSON error body.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<InvalidateQuery>, QueryRejection>,
) -> Result<Json<InvalidateResponse>> {
    let Query(query) = query.map_err(|e| CacheError::InvalidQuery(e.body_text()))?;
    let removed = state.candidates.invalidate_pattern(&query.pattern).await?;
    Ok(Json(InvalidateResponse {
        pattern: query.pattern,
        removed,
    }))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
