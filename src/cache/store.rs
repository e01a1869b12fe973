//! Bounded Store Module
//!
//! Generic expiring map with a hard capacity ceiling. Expiry is lazy: entries
//! past their TTL are dropped when an access touches them. When an insert would
//! exceed capacity, the oldest half of the store is evicted by insertion time
//! regardless of whether those entries are still live.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::cache::eviction::{eviction_count, oldest_keys};
use crate::cache::{CacheEntry, CacheStats, StoreSnapshot};
use crate::error::{CacheError, Result};

// == Bounded Store ==
/// Capacity-bounded key/value storage with per-entry TTL.
#[derive(Debug)]
pub struct BoundedStore<K, V> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// Performance counters
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_size: usize,
    /// Next insertion sequence number
    next_seq: u64,
}

impl<K, V> BoundedStore<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates an empty store holding at most `max_size` entries (minimum 1).
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            max_size: max_size.max(1),
            next_seq: 0,
        }
    }

    // == Set ==
    /// Inserts or overwrites `key` with a fresh insertion time.
    ///
    /// Inserting a new key into a full store first evicts the oldest half so
    /// that, once this call returns, at most `ceil(max_size / 2)` entries remain.
    pub fn set(&mut self, key: K, value: V, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl);
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            self.evict_oldest_half();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, CacheEntry::new(value, ttl, seq));

        debug_assert!(self.entries.len() <= self.max_size);
        Ok(())
    }

    // == Get ==
    /// Returns a clone of the value if present and live.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get_mut(key).map(|value| value.clone())
    }

    /// Mutable access to a live value without refreshing its TTL.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.entries.remove(key);
            self.stats.record_expiration();
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.entries.get_mut(key).map(|entry| &mut entry.value)
    }

    // == Take ==
    /// Removes and returns the value if live. An expired entry is dropped.
    pub fn take<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.entries.remove(key)?;
        if entry.is_expired() {
            self.stats.record_expiration();
            None
        } else {
            Some(entry.value)
        }
    }

    // == Peek ==
    /// Read-only lookup: treats expired entries as absent but leaves them in place.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| &entry.value)
    }

    // == Invalidate ==
    /// Removes `key` unconditionally. Returns the value if one was present.
    pub fn invalidate<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Physical occupancy, including entries not yet lazily expired.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn counters(&self) -> &CacheStats {
        &self.stats
    }

    // == Eviction ==
    /// Drops the oldest entries by insertion time, leaving room for one insert
    /// within `ceil(max_size / 2)`.
    fn evict_oldest_half(&mut self) -> usize {
        let count = eviction_count(self.entries.len(), self.max_size);
        if count == 0 {
            return 0;
        }

        let victims = oldest_keys(
            self.entries.iter().map(|(key, entry)| (key, entry.age_key())),
            count,
        );
        for key in victims {
            self.entries.remove(&key);
        }

        self.stats.record_evictions(count);
        debug!(
            evicted = count,
            remaining = self.entries.len(),
            max_size = self.max_size,
            "capacity eviction"
        );
        count
    }
}

impl<K, V> BoundedStore<K, V>
where
    K: Eq + Hash + Clone + Display,
{
    // == Invalidate Pattern ==
    /// Removes every key whose string form matches `pattern`.
    ///
    /// Returns the number of entries removed; a malformed pattern is rejected.
    pub fn invalidate_pattern(&mut self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern)?;
        Ok(self.invalidate_regex(&regex))
    }

    /// Same as [`invalidate_pattern`](Self::invalidate_pattern) with a compiled pattern.
    pub fn invalidate_regex(&mut self, regex: &Regex) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| !regex.is_match(&key.to_string()));
        before - self.entries.len()
    }

    // == Stats ==
    /// Returns size, capacity, key set and counters without mutating the store.
    pub fn stats(&self) -> StoreSnapshot {
        StoreSnapshot {
            size: self.entries.len(),
            max_size: self.max_size,
            keys: self.entries.keys().map(|key| key.to_string()).collect(),
            counters: self.stats.clone(),
        }
    }
}
