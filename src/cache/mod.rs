//! Cache Module
//!
//! Bounded in-memory storage with lazy TTL expiration and oldest-first
//! capacity eviction.

mod entry;
mod eviction;
mod sharded;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use eviction::{eviction_count, oldest_keys};
pub use sharded::{shard_capacities, Sharded};
pub use stats::{CacheStats, StoreSnapshot};
pub use store::BoundedStore;
