//! Candidate Queue Cache
//!
//! Serves ranked candidates per user from memory and decides when a refill
//! should be computed ahead of exhaustion. Each shard holds two bounded stores:
//! the queues themselves and short-lived in-flight prefetch markers.

use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use crate::cache::{shard_capacities, BoundedStore, Sharded, StoreSnapshot};
use crate::candidates::{CandidateQueue, CandidateRef, InstallPolicy};
use crate::config::Config;
use crate::error::Result;

#[derive(Debug)]
struct CandidateShard {
    queues: BoundedStore<String, CandidateQueue>,
    in_flight: BoundedStore<String, ()>,
}

// == Candidate Cache ==
/// Per-user candidate queues with prefetch scheduling.
#[derive(Debug)]
pub struct CandidateCache {
    shards: Sharded<CandidateShard>,
    ttl: Duration,
    prefetch_timeout: Duration,
    low_water_percent: usize,
    low_water_floor: usize,
}

impl CandidateCache {
    // == Constructor ==
    /// Creates an empty cache sized and tuned from `config`.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let capacities = shard_capacities(config.candidate_max_users, config.shard_count);
        let shards = Sharded::new(capacities.len(), |i| CandidateShard {
            queues: BoundedStore::new(capacities[i]),
            in_flight: BoundedStore::new(capacities[i]),
        });

        Ok(Self {
            shards,
            ttl: config.candidate_ttl(),
            prefetch_timeout: config.prefetch_timeout(),
            low_water_percent: config.low_water_percent,
            low_water_floor: config.low_water_floor,
        })
    }

    // == Get ==
    /// Current queue for `user_id`, if one is live.
    pub async fn get(&self, user_id: &str) -> Option<CandidateQueue> {
        let mut shard = self.shards.lock(user_id).await;
        shard.queues.get(user_id)
    }

    pub async fn contains(&self, user_id: &str) -> bool {
        let shard = self.shards.lock(user_id).await;
        shard.queues.peek(user_id).is_some()
    }

    // == Consume ==
    /// Serves up to `count` candidates, advancing the cursor.
    ///
    /// Returns an empty batch when no queue exists; the caller must then
    /// trigger a cold population.
    pub async fn consume(&self, user_id: &str, count: usize) -> Vec<CandidateRef> {
        let mut shard = self.shards.lock(user_id).await;
        match shard.queues.get_mut(user_id) {
            Some(queue) => queue.consume(count),
            None => Vec::new(),
        }
    }

    // == Install ==
    /// Installs a computed batch and clears any in-flight prefetch marker.
    ///
    /// `Replenish` applies only while the user's in-flight marker is held. If the
    /// marker is gone (invalidated, timed out, or superseded by a cold install)
    /// the batch is stale and is dropped, returning 0. With the marker held, a
    /// missing or expired queue is installed cold.
    /// Returns the queue's remaining count afterwards.
    pub async fn install(
        &self,
        user_id: &str,
        candidates: Vec<CandidateRef>,
        policy: InstallPolicy,
    ) -> Result<usize> {
        let batch = candidates.len();
        let mut shard = self.shards.lock(user_id).await;
        let claimed = shard.in_flight.take(user_id).is_some();

        if policy == InstallPolicy::Replenish && !claimed {
            debug!(user_id, batch, "dropped stale refill");
            return Ok(0);
        }

        let queue = match (policy, shard.queues.take(user_id)) {
            (InstallPolicy::Replenish, Some(mut queue)) => {
                let added = queue.replenish(candidates);
                debug!(user_id, batch, added, remaining = queue.remaining(), "replenished queue");
                queue
            }
            _ => {
                debug!(user_id, batch, "cold install");
                CandidateQueue::cold(user_id, candidates)
            }
        };

        let remaining = queue.remaining();
        shard.queues.set(user_id.to_string(), queue, self.ttl)?;
        Ok(remaining)
    }

    // == Remaining Count ==
    /// Unserved candidates for `user_id`, 0 if no queue exists.
    pub async fn remaining_count(&self, user_id: &str) -> usize {
        let shard = self.shards.lock(user_id).await;
        shard.queues.peek(user_id).map_or(0, CandidateQueue::remaining)
    }

    // == Should Prefetch ==
    /// Claims the right to compute a refill for `user_id`.
    ///
    /// True only when a queue exists, it is at or below the low-water mark and
    /// no prefetch is already outstanding. A true result sets the in-flight
    /// marker under the same lock, so concurrent callers see exactly one true.
    pub async fn should_prefetch(&self, user_id: &str) -> bool {
        let mut shard = self.shards.lock(user_id).await;
        let below = shard
            .queues
            .peek(user_id)
            .is_some_and(|queue| self.below_low_water(queue));

        if !below || shard.in_flight.peek(user_id).is_some() {
            return false;
        }

        let claimed = shard
            .in_flight
            .set(user_id.to_string(), (), self.prefetch_timeout)
            .is_ok();
        if claimed {
            info!(user_id, "prefetch scheduled");
        }
        claimed
    }

    /// Clears the in-flight marker after a failed refill so a later check may retry.
    pub async fn abort_prefetch(&self, user_id: &str) {
        let mut shard = self.shards.lock(user_id).await;
        shard.in_flight.invalidate(user_id);
    }

    /// Read-only low-water test, ignoring the in-flight marker.
    pub async fn needs_prefetch(&self, user_id: &str) -> bool {
        let shard = self.shards.lock(user_id).await;
        shard
            .queues
            .peek(user_id)
            .is_some_and(|queue| self.below_low_water(queue))
    }

    pub async fn prefetch_in_flight(&self, user_id: &str) -> bool {
        let shard = self.shards.lock(user_id).await;
        shard.in_flight.peek(user_id).is_some()
    }

    // == Invalidate ==
    /// Drops the user's queue and prefetch marker, e.g. after their match graph changed.
    pub async fn invalidate(&self, user_id: &str) {
        let mut shard = self.shards.lock(user_id).await;
        shard.queues.invalidate(user_id);
        shard.in_flight.invalidate(user_id);
    }

    /// Drops every queue whose user id matches `pattern`. Returns the count removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern)?;
        let removed = self
            .shards
            .fold(0, |acc, shard| {
                shard.in_flight.invalidate_regex(&regex);
                acc + shard.queues.invalidate_regex(&regex)
            })
            .await;
        info!(pattern, removed, "invalidated candidate queues");
        Ok(removed)
    }

    // == Stats ==
    pub async fn queue_stats(&self) -> StoreSnapshot {
        self.shards
            .fold(StoreSnapshot::default(), |acc, shard| acc.merge(shard.queues.stats()))
            .await
    }

    pub async fn marker_stats(&self) -> StoreSnapshot {
        self.shards
            .fold(StoreSnapshot::default(), |acc, shard| {
                acc.merge(shard.in_flight.stats())
            })
            .await
    }

    fn below_low_water(&self, queue: &CandidateQueue) -> bool {
        queue.is_below_low_water(self.low_water_percent, self.low_water_floor)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn batch(prefix: &str, n: usize) -> Vec<CandidateRef> {
        (0..n)
            .map(|i| CandidateRef::new(format!("{}{}", prefix, i), 100.0 - i as f64))
            .collect()
    }

    /// 50-candidate batches with a mark of 10 (20%) and a floor of 3.
    fn test_cache() -> CandidateCache {
        CandidateCache::new(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_absent_user() {
        let cache = test_cache();

        assert!(cache.get("u1").await.is_none());
        assert_eq!(cache.remaining_count("u1").await, 0);
        assert!(cache.consume("u1", 5).await.is_empty());
        assert!(!cache.should_prefetch("u1").await);
    }

    #[tokio::test]
    async fn test_cold_install_and_consume() {
        let cache = test_cache();

        let remaining = cache.install("u1", batch("c", 50), InstallPolicy::Cold).await.unwrap();
        assert_eq!(remaining, 50);

        let served = cache.consume("u1", 10).await;
        assert_eq!(served.len(), 10);
        assert_eq!(served[0].id, "c0");
        assert_eq!(cache.remaining_count("u1").await, 40);
        assert_eq!(cache.get("u1").await.unwrap().cursor, 10);
    }

    #[tokio::test]
    async fn test_consume_past_end() {
        let cache = test_cache();
        cache.install("u1", batch("c", 5), InstallPolicy::Cold).await.unwrap();

        let served = cache.consume("u1", 100).await;

        assert_eq!(served.len(), 5);
        assert_eq!(cache.remaining_count("u1").await, 0);
        assert_eq!(cache.get("u1").await.unwrap().cursor, 5);
    }

    #[tokio::test]
    async fn test_prefetch_then_replenish() {
        let cache = test_cache();
        cache.install("u1", batch("a", 50), InstallPolicy::Cold).await.unwrap();

        cache.consume("u1", 41).await;
        assert!(cache.should_prefetch("u1").await);

        let before = cache.get("u1").await.unwrap();
        cache.install("u1", batch("b", 50), InstallPolicy::Replenish).await.unwrap();
        let after = cache.get("u1").await.unwrap();

        assert_eq!(after.remaining(), before.remaining() + 50);
        assert_eq!(after.cursor, before.cursor);
        assert!(!cache.prefetch_in_flight("u1").await);
    }

    #[tokio::test]
    async fn test_cold_install_resets_cursor() {
        let cache = test_cache();
        cache.install("u1", batch("a", 20), InstallPolicy::Cold).await.unwrap();
        cache.consume("u1", 15).await;

        cache.install("u1", batch("b", 20), InstallPolicy::Cold).await.unwrap();

        let queue = cache.get("u1").await.unwrap();
        assert_eq!(queue.cursor, 0);
        assert_eq!(queue.candidates[0].id, "b0");
    }

    #[tokio::test]
    async fn test_replenish_without_marker_is_dropped() {
        let cache = test_cache();
        let remaining = cache
            .install("u1", batch("a", 10), InstallPolicy::Replenish)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
        assert!(!cache.contains("u1").await);
    }

    #[tokio::test]
    async fn test_refill_after_invalidate_is_discarded() {
        let cache = test_cache();
        cache.install("u1", batch("a", 10), InstallPolicy::Cold).await.unwrap();
        cache.consume("u1", 9).await;
        assert!(cache.should_prefetch("u1").await);

        // Match graph changed while the refill was computing
        cache.invalidate("u1").await;
        let remaining = cache
            .install("u1", batch("stale", 10), InstallPolicy::Replenish)
            .await
            .unwrap();

        assert_eq!(remaining, 0);
        assert!(cache.get("u1").await.is_none());
    }

    #[tokio::test]
    async fn test_refill_after_cold_install_is_discarded() {
        let cache = test_cache();
        cache.install("u1", batch("a", 10), InstallPolicy::Cold).await.unwrap();
        cache.consume("u1", 9).await;
        assert!(cache.should_prefetch("u1").await);

        cache.install("u1", batch("b", 10), InstallPolicy::Cold).await.unwrap();
        cache.install("u1", batch("stale", 10), InstallPolicy::Replenish).await.unwrap();

        let queue = cache.get("u1").await.unwrap();
        assert_eq!(queue.candidates.len(), 10);
        assert_eq!(queue.candidates[0].id, "b0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_after_marker_timeout_is_discarded() {
        let config = Config {
            prefetch_timeout: 5,
            ..Config::default()
        };
        let cache = CandidateCache::new(&config).unwrap();
        cache.install("u1", batch("a", 10), InstallPolicy::Cold).await.unwrap();
        cache.consume("u1", 9).await;
        assert!(cache.should_prefetch("u1").await);

        tokio::time::advance(Duration::from_secs(6)).await;
        cache.install("u1", batch("late", 10), InstallPolicy::Replenish).await.unwrap();

        assert_eq!(cache.remaining_count("u1").await, 1);
    }

    #[tokio::test]
    async fn test_replenish_with_marker_on_expired_queue_is_cold() {
        let cache = test_cache();
        cache.install("u1", batch("a", 10), InstallPolicy::Cold).await.unwrap();
        cache.consume("u1", 9).await;
        assert!(cache.should_prefetch("u1").await);

        // Queue evicted or expired while the marker survived
        cache.shards.lock("u1").await.queues.invalidate("u1");
        let remaining = cache
            .install("u1", batch("b", 10), InstallPolicy::Replenish)
            .await
            .unwrap();

        assert_eq!(remaining, 10);
        assert_eq!(cache.get("u1").await.unwrap().cursor, 0);
    }

    #[tokio::test]
    async fn test_should_prefetch_above_mark() {
        let cache = test_cache();
        cache.install("u1", batch("a", 50), InstallPolicy::Cold).await.unwrap();
        cache.consume("u1", 39).await;

        assert!(!cache.should_prefetch("u1").await);
        assert!(!cache.needs_prefetch("u1").await);
    }

    #[tokio::test]
    async fn test_in_flight_marker_blocks_second_prefetch() {
        let cache = test_cache();
        cache.install("u1", batch("a", 50), InstallPolicy::Cold).await.unwrap();
        cache.consume("u1", 45).await;

        assert!(cache.should_prefetch("u1").await);
        assert!(!cache.should_prefetch("u1").await);
        assert!(cache.needs_prefetch("u1").await);
        assert!(cache.prefetch_in_flight("u1").await);
    }

    #[tokio::test]
    async fn test_concurrent_should_prefetch_claims_once() {
        let cache = Arc::new(test_cache());
        cache.install("u1", batch("a", 50), InstallPolicy::Cold).await.unwrap();
        cache.consume("u1", 45).await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.should_prefetch("u1").await })
            })
            .collect();

        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn test_concurrent_consume_no_double_count() {
        let cache = Arc::new(test_cache());
        cache.install("u1", batch("a", 100), InstallPolicy::Cold).await.unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.consume("u1", 7).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.extend(handle.await.unwrap().into_iter().map(|c| c.id));
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 70);
        assert_eq!(cache.remaining_count("u1").await, 30);
    }

    #[tokio::test]
    async fn test_abort_prefetch_allows_retry() {
        let cache = test_cache();
        cache.install("u1", batch("a", 10), InstallPolicy::Cold).await.unwrap();
        cache.consume("u1", 9).await;

        assert!(cache.should_prefetch("u1").await);
        cache.abort_prefetch("u1").await;
        assert!(cache.should_prefetch("u1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_marker_expires() {
        let config = Config {
            prefetch_timeout: 5,
            ..Config::default()
        };
        let cache = CandidateCache::new(&config).unwrap();
        cache.install("u1", batch("a", 10), InstallPolicy::Cold).await.unwrap();
        cache.consume("u1", 10).await;

        assert!(cache.should_prefetch("u1").await);
        tokio::time::advance(Duration::from_secs(6)).await;

        // The stuck prefetch no longer blocks a new one
        assert!(!cache.prefetch_in_flight("u1").await);
        assert!(cache.should_prefetch("u1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_expires() {
        let config = Config {
            candidate_ttl: 60,
            ..Config::default()
        };
        let cache = CandidateCache::new(&config).unwrap();
        cache.install("u1", batch("a", 10), InstallPolicy::Cold).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(cache.get("u1").await.is_none());
        assert!(!cache.should_prefetch("u1").await);
    }

    #[tokio::test]
    async fn test_zero_low_water_mark() {
        let config = Config {
            low_water_percent: 0,
            low_water_floor: 0,
            ..Config::default()
        };
        let cache = CandidateCache::new(&config).unwrap();
        cache.install("u1", batch("a", 10), InstallPolicy::Cold).await.unwrap();

        cache.consume("u1", 9).await;
        assert!(!cache.should_prefetch("u1").await);
        cache.consume("u1", 1).await;
        assert!(cache.should_prefetch("u1").await);
    }

    #[tokio::test]
    async fn test_invalidate_clears_queue_and_marker() {
        let cache = test_cache();
        cache.install("u1", batch("a", 10), InstallPolicy::Cold).await.unwrap();
        cache.consume("u1", 10).await;
        assert!(cache.should_prefetch("u1").await);

        cache.invalidate("u1").await;
        cache.invalidate("u1").await;

        assert!(cache.get("u1").await.is_none());
        assert!(!cache.prefetch_in_flight("u1").await);
    }

    #[tokio::test]
    async fn test_invalidate_pattern() {
        let cache = test_cache();
        for user in ["school-a:1", "school-a:2", "school-b:1"] {
            cache.install(user, batch("c", 5), InstallPolicy::Cold).await.unwrap();
        }

        let removed = cache.invalidate_pattern("^school-a:").await.unwrap();

        assert_eq!(removed, 2);
        assert!(cache.get("school-b:1").await.is_some());
        assert!(cache.invalidate_pattern("[").await.is_err());
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let config = Config {
            candidate_max_users: 8,
            shard_count: 1,
            ..Config::default()
        };
        let cache = CandidateCache::new(&config).unwrap();

        for i in 0..20 {
            cache
                .install(&format!("u{}", i), batch("c", 3), InstallPolicy::Cold)
                .await
                .unwrap();
            assert!(cache.queue_stats().await.size <= 8);
        }

        // Most recent user survives eviction
        assert!(cache.get("u19").await.is_some());
        let stats = cache.queue_stats().await;
        assert_eq!(stats.max_size, 8);
        assert!(stats.counters.evictions > 0);
    }

    #[tokio::test]
    async fn test_capacity_below_shard_count() {
        let config = Config {
            candidate_max_users: 3,
            shard_count: 16,
            ..Config::default()
        };
        let cache = CandidateCache::new(&config).unwrap();

        for i in 0..200 {
            cache
                .install(&format!("u{}", i), batch("c", 3), InstallPolicy::Cold)
                .await
                .unwrap();
            assert!(cache.queue_stats().await.size <= 3);
        }
        assert_eq!(cache.queue_stats().await.max_size, 3);
    }

    #[tokio::test]
    async fn test_reported_capacity_matches_config() {
        let config = Config {
            candidate_max_users: 10,
            shard_count: 4,
            ..Config::default()
        };
        let cache = CandidateCache::new(&config).unwrap();

        assert_eq!(cache.queue_stats().await.max_size, 10);
        assert_eq!(cache.marker_stats().await.max_size, 10);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            prefetch_timeout: 0,
            ..Config::default()
        };
        assert!(CandidateCache::new(&config).is_err());
    }
}
