//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Insertion time, used for both expiry and oldest-first eviction
    pub inserted_at: Instant,
    /// Time-to-live measured from `inserted_at`
    pub ttl: Duration,
    /// Insertion sequence number, breaks ties between equal `inserted_at`
    pub(crate) seq: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current time.
    pub fn new(value: V, ttl: Duration, seq: u64) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
            seq,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is logically absent once strictly more than `ttl` has elapsed
    /// since insertion; at exactly `ttl` it is still live.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }

    // == Time To Live ==
    /// Returns remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl
            .saturating_sub(Instant::now().saturating_duration_since(self.inserted_at))
    }

    /// Age ordering key for oldest-first eviction.
    pub(crate) fn age_key(&self) -> (Instant, u64) {
        (self.inserted_at, self.seq)
    }
}
