use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maps a failed attempt index to the delay before the next attempt.
///
/// `attempt_index` is 0-based: the delay returned for index `n` is applied
/// after the attempt numbered `n` has failed. Implementations must be pure
/// and total over all indices.
pub trait BackoffPolicy: Send + Sync {
    fn delay(&self, attempt_index: u32) -> Duration;
}

/// Fixed lookup table. Indices beyond the table length clamp to the last
/// entry; an empty table yields zero delay.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryTable {
    delays: Vec<Duration>,
}

impl RetryTable {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }
}

impl Default for RetryTable {
    /// The reference schedule: 1s, 5s, 30s.
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(1),
            Duration::from_secs(5),
            Duration::from_secs(30),
        ])
    }
}

impl BackoffPolicy for RetryTable {
    fn delay(&self, attempt_index: u32) -> Duration {
        match self.delays.last() {
            None => Duration::ZERO,
            Some(last) => *self
                .delays
                .get(attempt_index as usize)
                .unwrap_or(last),
        }
    }
}

/// `base * 2^attempt_index`, capped at `max`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, attempt_index: u32) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let exp = attempt_index.min(63);
        let ms = base_ms.saturating_mul(1u64 << exp).min(max_ms);
        Duration::from_millis(ms)
    }
}

/// Serializable backoff selection persisted inside `QueueConfig`. The
/// scheduler materializes it into a policy object at queue creation and
/// again during recovery, so the policy stays per-queue and replaceable
/// without touching queue or worker code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffConfig {
    Table { delays_ms: Vec<u64> },
    Exponential { base_ms: u64, max_ms: u64 },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Table {
            delays_ms: vec![1_000, 5_000, 30_000],
        }
    }
}

impl BackoffConfig {
    pub fn policy(&self) -> Box<dyn BackoffPolicy> {
        match self {
            BackoffConfig::Table { delays_ms } => Box::new(RetryTable::new(
                delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
            )),
            BackoffConfig::Exponential { base_ms, max_ms } => Box::new(ExponentialBackoff::new(
                Duration::from_millis(*base_ms),
                Duration::from_millis(*max_ms),
            )),
        }
    }
}
