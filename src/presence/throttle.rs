//! Presence Throttle
//!
//! Coalesces high-frequency heartbeats into at most one durable write per
//! window per user. The timestamp map is capacity-bounded on its own terms:
//! when full, the half with the oldest write times is dropped, and a user whose
//! record was dropped simply writes again on their next heartbeat.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{
    eviction_count, oldest_keys, shard_capacities, CacheStats, Sharded, StoreSnapshot,
};
use crate::collaborators::{Broadcaster, StatusStore};
use crate::config::Config;
use crate::error::Result;
use crate::presence::{
    event_payload, PresenceStatus, HEARTBEAT_EVENT, PRESENCE_CHANNEL, STATUS_CHANGED_EVENT,
};

/// Result of a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeartbeatOutcome {
    /// True when no durable write was attempted
    pub throttled: bool,
}

#[derive(Debug, Clone)]
struct PresenceRecord {
    last_durable_write_at: Option<Instant>,
    /// Set while a durable write is outstanding
    pending_since: Option<Instant>,
    seq: u64,
}

impl PresenceRecord {
    fn age_key(&self) -> (Option<Instant>, u64) {
        (self.last_durable_write_at.or(self.pending_since), self.seq)
    }
}

#[derive(Debug)]
struct PresenceShard {
    records: HashMap<String, PresenceRecord>,
    max_size: usize,
    next_seq: u64,
    stats: CacheStats,
}

impl PresenceShard {
    fn new(max_size: usize) -> Self {
        Self {
            records: HashMap::new(),
            max_size,
            next_seq: 0,
            stats: CacheStats::new(),
        }
    }

    /// Returns the record for `user_id`, creating it (and evicting if full) when absent.
    fn entry(&mut self, user_id: &str) -> &mut PresenceRecord {
        if !self.records.contains_key(user_id) && self.records.len() >= self.max_size {
            self.evict_oldest_half();
        }
        let next_seq = &mut self.next_seq;
        self.records
            .entry(user_id.to_string())
            .or_insert_with(|| {
                let seq = *next_seq;
                *next_seq += 1;
                PresenceRecord {
                    last_durable_write_at: None,
                    pending_since: None,
                    seq,
                }
            })
    }

    fn evict_oldest_half(&mut self) {
        let count = eviction_count(self.records.len(), self.max_size);
        let victims = oldest_keys(
            self.records.iter().map(|(user_id, record)| (user_id, record.age_key())),
            count,
        );
        for user_id in victims {
            self.records.remove(&user_id);
        }
        self.stats.record_evictions(count);
        debug!(evicted = count, remaining = self.records.len(), "presence eviction");
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            size: self.records.len(),
            max_size: self.max_size,
            keys: self.records.keys().cloned().collect(),
            counters: self.stats.clone(),
        }
    }
}

// == Presence Throttle ==
#[derive(Debug)]
pub struct PresenceThrottle {
    shards: Sharded<PresenceShard>,
    window: Duration,
    pending_timeout: Duration,
}

impl PresenceThrottle {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let capacities = shard_capacities(config.presence_max_users, config.shard_count);
        Ok(Self {
            shards: Sharded::new(capacities.len(), |i| PresenceShard::new(capacities[i])),
            window: config.presence_window(),
            pending_timeout: config.presence_pending_timeout(),
        })
    }

    // == Record Heartbeat ==
    /// Writes `user_id`'s liveness to `store` unless a write landed within the window.
    ///
    /// The window timestamp is committed only after the store accepts the write,
    /// so a failed write leaves the user eligible on the very next heartbeat.
    /// While one write is outstanding, concurrent heartbeats for the same user
    /// are throttled. A successful write publishes an `online` event; a
    /// publish failure is logged and does not fail the heartbeat.
    pub async fn record_heartbeat(
        &self,
        user_id: &str,
        store: &dyn StatusStore,
        broadcaster: &dyn Broadcaster,
    ) -> Result<HeartbeatOutcome> {
        let now = Instant::now();
        {
            let mut shard = self.shards.lock(user_id).await;
            let throttled = match shard.records.get(user_id) {
                Some(record) => self.is_throttled(record, now),
                None => false,
            };
            if throttled {
                shard.stats.record_hit();
                return Ok(HeartbeatOutcome { throttled: true });
            }
            shard.stats.record_miss();
            shard.entry(user_id).pending_since = Some(now);
        }

        let at = Utc::now();
        let written = store.write_last_active(user_id, at).await;

        {
            let mut shard = self.shards.lock(user_id).await;
            match &written {
                Ok(()) => {
                    let record = shard.entry(user_id);
                    record.last_durable_write_at = Some(now);
                    record.pending_since = None;
                }
                Err(e) => {
                    warn!(user_id, error = %e, "heartbeat write failed");
                    if let Some(record) = shard.records.get_mut(user_id) {
                        record.pending_since = None;
                    }
                }
            }
        }
        written?;

        let payload = event_payload(user_id, PresenceStatus::Online, at);
        if let Err(e) = broadcaster
            .publish(PRESENCE_CHANNEL, HEARTBEAT_EVENT, payload)
            .await
        {
            warn!(user_id, error = %e, "heartbeat broadcast failed");
        }

        Ok(HeartbeatOutcome { throttled: false })
    }

    // == Set Status ==
    /// Persists and broadcasts an explicit status transition, ignoring the throttle.
    pub async fn set_status(
        &self,
        user_id: &str,
        status: PresenceStatus,
        store: &dyn StatusStore,
        broadcaster: &dyn Broadcaster,
    ) -> Result<()> {
        let at = Utc::now();
        store.write_status(user_id, status, at).await?;
        broadcaster
            .publish(
                PRESENCE_CHANNEL,
                STATUS_CHANGED_EVENT,
                event_payload(user_id, status, at),
            )
            .await?;
        debug!(user_id, %status, "status broadcast");
        Ok(())
    }

    /// Drops the user's throttle record; their next heartbeat writes.
    pub async fn forget(&self, user_id: &str) {
        let mut shard = self.shards.lock(user_id).await;
        shard.records.remove(user_id);
    }

    /// Time since the last successful durable write, if one is recorded.
    pub async fn last_write_age(&self, user_id: &str) -> Option<Duration> {
        let shard = self.shards.lock(user_id).await;
        shard
            .records
            .get(user_id)
            .and_then(|record| record.last_durable_write_at)
            .map(|at| at.elapsed())
    }

    pub async fn contains(&self, user_id: &str) -> bool {
        let shard = self.shards.lock(user_id).await;
        shard.records.contains_key(user_id)
    }

    pub async fn stats(&self) -> StoreSnapshot {
        self.shards
            .fold(StoreSnapshot::default(), |acc, shard| acc.merge(shard.snapshot()))
            .await
    }

    fn is_throttled(&self, record: &PresenceRecord, now: Instant) -> bool {
        let pending = record
            .pending_since
            .is_some_and(|since| now.saturating_duration_since(since) < self.pending_timeout);
        let recent = record
            .last_durable_write_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.window);
        pending || recent
    }
}
