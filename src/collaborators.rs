//! External Collaborators
//!
//! Contracts for the services this subsystem calls but does not own. Each call
//! is made with no cache lock held, so collaborator latency never blocks other
//! users' cache operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::candidates::CandidateRef;
use crate::error::{DeliveryError, ScoringError, StoreError};
use crate::presence::PresenceStatus;

// == Scorer ==
/// Computes a ranked candidate list for a user.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn compute_candidates(&self, user_id: &str) -> Result<Vec<CandidateRef>, ScoringError>;
}

// == Status Store ==
/// Durable record of user liveness.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Persists the time a user was last seen alive.
    async fn write_last_active(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Persists an explicit presence status.
    async fn write_status(
        &self,
        user_id: &str,
        status: PresenceStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

// == Broadcaster ==
/// Fan-out publish primitive. Delivery is at-most-once from our side.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, channel: &str, event: &str, payload: Value) -> Result<(), DeliveryError>;
}
