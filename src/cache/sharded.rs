//! Sharded Locking
//!
//! Splits a keyed structure into independently locked shards so operations on
//! different keys rarely contend while operations on the same key serialize.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

// == Sharded ==
/// A fixed set of mutex-guarded shards addressed by key hash.
#[derive(Debug)]
pub struct Sharded<T> {
    shards: Vec<Mutex<T>>,
}

impl<T> Sharded<T> {
    /// Builds `count` shards (minimum 1), each created by `init(shard_index)`.
    pub fn new(count: usize, mut init: impl FnMut(usize) -> T) -> Self {
        let shards = (0..count.max(1)).map(|i| Mutex::new(init(i))).collect();
        Self { shards }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard owning `key`.
    pub fn index_of<Q: Hash + ?Sized>(&self, key: &Q) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    // == Locking ==
    /// Locks the shard owning `key`.
    pub async fn lock<Q: Hash + ?Sized>(&self, key: &Q) -> MutexGuard<'_, T> {
        self.shards[self.index_of(key)].lock().await
    }

    /// Visits every shard in turn, holding one lock at a time.
    pub async fn fold<A>(&self, init: A, mut f: impl FnMut(A, &mut T) -> A) -> A {
        let mut acc = init;
        for shard in &self.shards {
            let mut guard = shard.lock().await;
            acc = f(acc, &mut guard);
        }
        acc
    }
}

// == Capacity Split ==
/// Splits `total` across at most `shards` shards so the capacities sum to exactly `total`.
///
/// A total smaller than the shard count yields one single-slot shard per unit
/// of capacity. Leftover slots go to the first shards.
pub fn shard_capacities(total: usize, shards: usize) -> Vec<usize> {
    let total = total.max(1);
    let count = shards.clamp(1, total);
    let base = total / count;
    let extra = total % count;
    (0..count).map(|i| base + usize::from(i < extra)).collect()
}
