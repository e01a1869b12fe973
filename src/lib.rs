//! Matchcache - recommendation cache and presence throttle
//!
//! Process-resident caching for a matching service: per-user ranked candidate
//! queues with ahead-of-exhaustion prefetch, throttled liveness writes with
//! presence broadcasts, and a bounded TTL store underneath both.

pub mod api;
pub mod cache;
pub mod candidates;
pub mod collaborators;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod models;
pub mod presence;

pub use api::AppState;
pub use config::Config;
pub use error::{CacheError, Result};
