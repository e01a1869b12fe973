//! Cache Statistics Module
//!
//! Tracks store counters and produces read-only occupancy snapshots.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (absent or expired)
    pub misses: u64,
    /// Number of live or stale entries removed by capacity eviction
    pub evictions: u64,
    /// Number of entries dropped lazily after their TTL elapsed
    pub expirations: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    /// Adds another shard's counters into this one.
    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.evictions += other.evictions;
        self.expirations += other.expirations;
    }
}

// == Store Snapshot ==
/// Point-in-time view of a store's occupancy.
///
/// `size` is physical occupancy: entries past their TTL that have not yet been
/// touched still count until an access removes them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    pub size: usize,
    pub max_size: usize,
    pub keys: Vec<String>,
    #[serde(flatten)]
    pub counters: CacheStats,
}

impl StoreSnapshot {
    /// Combines per-shard snapshots into one component-level view.
    pub fn merge(mut self, other: StoreSnapshot) -> Self {
        self.size += other.size;
        self.max_size += other.max_size;
        self.keys.extend(other.keys);
        self.counters.merge(&other.counters);
        self
    }
}
