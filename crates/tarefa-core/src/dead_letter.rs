use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::{FailureInfo, Job};

/// Terminal record for a job that exhausted its retry budget. Created exactly
/// once per permanently-failed job, immutable thereafter, retained until an
/// operator purges it.
///
/// `original_job_id` is best-effort diagnostic, not a join key — the sink
/// accepts records without one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeadLetterRecord {
    pub original_queue: String,
    pub original_job_id: Option<Uuid>,
    pub original_job_type: String,
    pub original_payload: Vec<u8>,
    pub failed_reason: String,
    /// Epoch nanoseconds of the final failure.
    pub failed_at: u64,
    /// Final attempt count.
    pub attempts_made: u32,
    pub stack_trace: Option<String>,
}

impl DeadLetterRecord {
    /// Derive a record from a job's final failure.
    pub fn from_job(job: &Job, error: &FailureInfo, failed_at: u64) -> Self {
        Self {
            original_queue: job.queue.clone(),
            original_job_id: Some(job.id),
            original_job_type: job.job_type.clone(),
            original_payload: job.payload.clone(),
            failed_reason: error.message.clone(),
            failed_at,
            attempts_made: job.attempts_made,
            stack_trace: error.trace.clone(),
        }
    }
}
