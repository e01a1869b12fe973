//! Diagnostics
//!
//! Read-only views over the candidate cache and presence throttle. Sizes are
//! physical occupancy: expired entries not yet touched by an access still count.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::StoreSnapshot;
use crate::candidates::CandidateCache;
use crate::presence::PresenceThrottle;

// == Snapshots ==
/// Occupancy of every component.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    /// Distinct users known to either component
    pub tracked_users: usize,
    pub candidate_queues: StoreSnapshot,
    pub prefetch_markers: StoreSnapshot,
    pub presence: StoreSnapshot,
}

/// What the subsystem knows about one user. Unknown users get the zero view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserSnapshot {
    pub user_id: String,
    pub has_queue: bool,
    pub remaining: usize,
    pub prefetch_needed: bool,
    pub prefetch_in_flight: bool,
    /// Milliseconds since the last durable heartbeat write
    pub last_heartbeat_ms: Option<u64>,
}

// == Diagnostics ==
#[derive(Debug, Clone)]
pub struct Diagnostics {
    candidates: Arc<CandidateCache>,
    presence: Arc<PresenceThrottle>,
}

impl Diagnostics {
    pub fn new(candidates: Arc<CandidateCache>, presence: Arc<PresenceThrottle>) -> Self {
        Self {
            candidates,
            presence,
        }
    }

    pub async fn snapshot(&self) -> SystemSnapshot {
        let candidate_queues = self.candidates.queue_stats().await;
        let prefetch_markers = self.candidates.marker_stats().await;
        let presence = self.presence.stats().await;

        let tracked_users = candidate_queues
            .keys
            .iter()
            .chain(presence.keys.iter())
            .collect::<HashSet<_>>()
            .len();

        SystemSnapshot {
            tracked_users,
            candidate_queues,
            prefetch_markers,
            presence,
        }
    }

    pub async fn user(&self, user_id: &str) -> UserSnapshot {
        UserSnapshot {
            user_id: user_id.to_string(),
            has_queue: self.candidates.contains(user_id).await,
            remaining: self.candidates.remaining_count(user_id).await,
            prefetch_needed: self.candidates.needs_prefetch(user_id).await,
            prefetch_in_flight: self.candidates.prefetch_in_flight(user_id).await,
            last_heartbeat_ms: self
                .presence
                .last_write_age(user_id)
                .await
                .map(|age| age.as_millis() as u64),
        }
    }
}
