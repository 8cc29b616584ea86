use serde::{Deserialize, Serialize};

use crate::backoff::BackoffConfig;

/// Queue configuration stored in the `queues` column family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    pub name: String,
    /// How long a claimed job may go unacknowledged before it is considered
    /// stalled and returned to the waiting pool.
    pub claim_timeout_ms: u64,
    /// Default `max_attempts` for jobs enqueued without an explicit value.
    pub default_max_attempts: u32,
    pub backoff: BackoffConfig,
    /// Optional cap on handler invocations per time window. When the cap is
    /// hit, eligible jobs stay waiting rather than failing.
    pub rate_limit: Option<RateLimit>,
    pub completed_retention: RetentionConfig,
}

impl QueueConfig {
    /// Default claim timeout: 30 seconds.
    pub const DEFAULT_CLAIM_TIMEOUT_MS: u64 = 30_000;
    /// Default retry budget per job.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            claim_timeout_ms: Self::DEFAULT_CLAIM_TIMEOUT_MS,
            default_max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffConfig::default(),
            rate_limit: None,
            completed_retention: RetentionConfig::default(),
        }
    }
}

/// Invocation cap per fixed window, e.g. email capped at 50 per 60s.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RateLimit {
    pub max_jobs: u32,
    pub window_ms: u64,
}

/// Retention for completed job records, kept for inspection only. The
/// dead-letter sink is exempt — it is never auto-pruned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    pub max_entries: usize,
    pub max_age_ms: u64,
}

impl Default for RetentionConfig {
    /// Keep the last 1000 completed jobs, at most 24 hours.
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            max_age_ms: 24 * 60 * 60 * 1_000,
        }
    }
}
