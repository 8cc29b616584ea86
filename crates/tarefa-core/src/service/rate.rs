use std::time::Instant;

use crate::queue::RateLimit;

/// A token bucket rate limiter for a single queue.
///
/// Tokens are refilled continuously based on elapsed time since the last
/// refill. The bucket never exceeds the burst capacity.
///
/// Runs on the single-threaded scheduler — no synchronization needed.
pub struct TokenBucket {
    tokens: f64,
    rate_per_second: f64,
    burst: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a new token bucket starting at full capacity.
    /// Negative values are clamped to 0.0.
    pub fn new(rate_per_second: f64, burst: f64) -> Self {
        let rate = rate_per_second.max(0.0);
        let burst = burst.max(0.0);
        Self {
            tokens: burst,
            rate_per_second: rate,
            burst,
            last_refill: Instant::now(),
        }
    }

    /// Build a bucket from a queue's configured rate limit: `max_jobs`
    /// deliveries per `window_ms`, with a burst of one window's worth.
    pub fn from_limit(limit: &RateLimit) -> Self {
        let window_secs = (limit.window_ms as f64 / 1000.0).max(f64::MIN_POSITIVE);
        Self::new(limit.max_jobs as f64 / window_secs, limit.max_jobs as f64)
    }

    /// Create a token bucket with a specific start time (for testing).
    #[cfg(test)]
    fn with_time(rate_per_second: f64, burst: f64, now: Instant) -> Self {
        let rate = rate_per_second.max(0.0);
        let burst = burst.max(0.0);
        Self {
            tokens: burst,
            rate_per_second: rate,
            burst,
            last_refill: now,
        }
    }

    /// Refill tokens based on elapsed time since last refill.
    /// Tokens are capped at the burst size.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.rate_per_second).min(self.burst);
            self.last_refill = now;
        }
    }

    /// Whether at least one token is available, without consuming anything.
    pub fn peek(&self) -> bool {
        self.tokens >= 1.0
    }

    /// Try to consume `n` tokens. Returns true and decrements if sufficient
    /// tokens are available; returns false without modification otherwise.
    pub fn try_consume(&mut self, n: f64) -> bool {
        if self.tokens >= n {
            self.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Current token count (for inspection/metrics).
    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}
