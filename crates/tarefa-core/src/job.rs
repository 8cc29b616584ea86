use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Core job envelope. This is the internal representation used by the
/// scheduler and storage layer — the payload is opaque, handler-defined data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub queue: String,
    /// Selects the handler within the queue's dispatch table.
    pub job_type: String,
    pub payload: Vec<u8>,
    /// Incremented by exactly 1 each time an invocation fails.
    /// Never exceeds `max_attempts`.
    pub attempts_made: u32,
    pub max_attempts: u32,
    /// Epoch nanoseconds, assigned at enqueue time, immutable.
    pub created_at: u64,
    /// Overwritten on each failure.
    pub last_error: Option<FailureInfo>,
}

impl Job {
    /// Generate a new UUIDv7 job ID (time-ordered).
    pub fn new_id() -> Uuid {
        Uuid::now_v7()
    }
}

/// Diagnostics captured from a failed handler invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureInfo {
    pub message: String,
    pub trace: Option<String>,
}

impl FailureInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: Some(trace.into()),
        }
    }
}

/// Per-job options supplied at enqueue time. Unset fields fall back to the
/// queue's configured defaults.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub max_attempts: Option<u32>,
    /// The job becomes visible to workers only after this delay elapses.
    /// Used internally by the retry scheduler; also available to producers.
    pub initial_delay: Option<Duration>,
}
