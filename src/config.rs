//! Configuration Module
//!
//! Handles loading and validating subsystem configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Subsystem configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of per-user candidate queues held in memory
    pub candidate_max_users: usize,
    /// Lifetime of a candidate queue in seconds
    pub candidate_ttl: u64,
    /// Low-water mark as a percentage of the last installed batch
    pub low_water_percent: usize,
    /// Absolute low-water floor in candidates
    pub low_water_floor: usize,
    /// Seconds after which an unfinished prefetch no longer blocks a new one
    pub prefetch_timeout: u64,
    /// Minimum seconds between durable heartbeat writes per user
    pub presence_window: u64,
    /// Maximum number of presence records held in memory
    pub presence_max_users: usize,
    /// Seconds after which an outstanding heartbeat write is considered abandoned
    pub presence_pending_timeout: u64,
    /// Number of independently locked shards per component
    pub shard_count: usize,
    /// HTTP port for the diagnostics server
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CANDIDATE_MAX_USERS` - Candidate queue capacity (default: 10000)
    /// - `CANDIDATE_TTL` - Candidate queue TTL in seconds (default: 1800)
    /// - `LOW_WATER_PERCENT` - Prefetch threshold percent of batch (default: 20)
    /// - `LOW_WATER_FLOOR` - Prefetch threshold floor (default: 3)
    /// - `PREFETCH_TIMEOUT` - In-flight prefetch marker TTL in seconds (default: 30)
    /// - `PRESENCE_WINDOW` - Heartbeat throttle window in seconds (default: 60)
    /// - `PRESENCE_MAX_USERS` - Presence record capacity (default: 10000)
    /// - `PRESENCE_PENDING_TIMEOUT` - Pending heartbeat write TTL in seconds (default: 10)
    /// - `SHARD_COUNT` - Lock shards per component (default: 16)
    /// - `SERVER_PORT` - Diagnostics HTTP port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            candidate_max_users: env_or("CANDIDATE_MAX_USERS", defaults.candidate_max_users),
            candidate_ttl: env_or("CANDIDATE_TTL", defaults.candidate_ttl),
            low_water_percent: env_or("LOW_WATER_PERCENT", defaults.low_water_percent),
            low_water_floor: env_or("LOW_WATER_FLOOR", defaults.low_water_floor),
            prefetch_timeout: env_or("PREFETCH_TIMEOUT", defaults.prefetch_timeout),
            presence_window: env_or("PRESENCE_WINDOW", defaults.presence_window),
            presence_max_users: env_or("PRESENCE_MAX_USERS", defaults.presence_max_users),
            presence_pending_timeout: env_or(
                "PRESENCE_PENDING_TIMEOUT",
                defaults.presence_pending_timeout,
            ),
            shard_count: env_or("SHARD_COUNT", defaults.shard_count),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    /// Rejects values the cache components cannot operate with.
    ///
    /// A zero throttle window and a zero low-water mark are valid.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.candidate_max_users == 0, "CANDIDATE_MAX_USERS must be > 0"),
            (self.candidate_ttl == 0, "CANDIDATE_TTL must be > 0"),
            (self.low_water_percent > 100, "LOW_WATER_PERCENT must be <= 100"),
            (self.prefetch_timeout == 0, "PREFETCH_TIMEOUT must be > 0"),
            (self.presence_max_users == 0, "PRESENCE_MAX_USERS must be > 0"),
            (
                self.presence_pending_timeout == 0,
                "PRESENCE_PENDING_TIMEOUT must be > 0",
            ),
            (self.shard_count == 0, "SHARD_COUNT must be > 0"),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, msg)) => Err(CacheError::InvalidConfig(msg.to_string())),
            None => Ok(()),
        }
    }

    pub fn candidate_ttl(&self) -> Duration {
        Duration::from_secs(self.candidate_ttl)
    }

    pub fn prefetch_timeout(&self) -> Duration {
        Duration::from_secs(self.prefetch_timeout)
    }

    pub fn presence_window(&self) -> Duration {
        Duration::from_secs(self.presence_window)
    }

    pub fn presence_pending_timeout(&self) -> Duration {
        Duration::from_secs(self.presence_pending_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            candidate_max_users: 10_000,
            candidate_ttl: 1800,
            low_water_percent: 20,
            low_water_floor: 3,
            prefetch_timeout: 30,
            presence_window: 60,
            presence_max_users: 10_000,
            presence_pending_timeout: 10,
            shard_count: 16,
            server_port: 3000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
