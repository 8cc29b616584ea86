use crate::dead_letter::DeadLetterRecord;
use crate::error::StorageResult;
use crate::job::Job;
use crate::queue::QueueConfig;

/// Represents a single operation in an atomic write batch.
#[derive(Debug)]
pub enum WriteBatchOp {
    PutJob { key: Vec<u8>, value: Vec<u8> },
    DeleteJob { key: Vec<u8> },
    PutClaim { key: Vec<u8>, value: Vec<u8> },
    DeleteClaim { key: Vec<u8> },
    PutClaimExpiry { key: Vec<u8> },
    DeleteClaimExpiry { key: Vec<u8> },
    PutDelayed { key: Vec<u8>, value: Vec<u8> },
    DeleteDelayed { key: Vec<u8> },
    PutCompleted { key: Vec<u8>, value: Vec<u8> },
    DeleteCompleted { key: Vec<u8> },
    PutDeadLetter { key: Vec<u8>, value: Vec<u8> },
    DeleteDeadLetter { key: Vec<u8> },
    /// Remove a queue config together with its rows. Queue deletion must be
    /// all-or-nothing: a config deleted ahead of its rows would strand them,
    /// since recovery only scans queues that still have a config.
    DeleteQueueConfig { queue: String },
}

/// Summary of an acked job, kept under the completed retention policy.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct CompletedRecord {
    pub job_id: uuid::Uuid,
    pub job_type: String,
    pub completed_at: u64,
    pub attempts_made: u32,
}

/// Storage trait for all persistence operations. Implementations must be
/// thread-safe; they can only fail with infrastructure errors.
pub trait Storage: Send + Sync {
    // --- Waiting jobs ---

    fn put_job(&self, key: &[u8], job: &Job) -> StorageResult<()>;
    fn get_job(&self, key: &[u8]) -> StorageResult<Option<Job>>;
    fn delete_job(&self, key: &[u8]) -> StorageResult<()>;
    /// List jobs whose keys start with the given prefix, in key order.
    fn list_jobs(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Job)>>;

    // --- Claims ---

    fn put_claim(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;
    fn get_claim(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;
    fn delete_claim(&self, key: &[u8]) -> StorageResult<()>;
    /// List claim-expiry keys at or before the given upper bound, earliest first.
    fn list_expired_claims(&self, up_to_key: &[u8]) -> StorageResult<Vec<Vec<u8>>>;

    // --- Delayed jobs ---

    /// List delayed jobs due at or before the given upper bound, earliest first.
    fn list_due_delayed(&self, up_to_key: &[u8]) -> StorageResult<Vec<(Vec<u8>, Job)>>;
    /// List all delayed jobs (recovery and stats).
    fn list_delayed(&self) -> StorageResult<Vec<(Vec<u8>, Job)>>;

    // --- Completed records ---

    fn list_completed(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, CompletedRecord)>>;

    // --- Dead letters ---

    fn put_dead_letter(&self, key: &[u8], record: &DeadLetterRecord) -> StorageResult<()>;
    fn list_dead_letters(&self, prefix: &[u8])
        -> StorageResult<Vec<(Vec<u8>, DeadLetterRecord)>>;
    /// List the entire dead-letter backlog across all origin queues.
    fn list_all_dead_letters(&self) -> StorageResult<Vec<(Vec<u8>, DeadLetterRecord)>>;

    // --- Queues ---

    fn put_queue(&self, queue: &str, config: &QueueConfig) -> StorageResult<()>;
    fn get_queue(&self, queue: &str) -> StorageResult<Option<QueueConfig>>;
    fn delete_queue(&self, queue: &str) -> StorageResult<()>;
    fn list_queues(&self) -> StorageResult<Vec<QueueConfig>>;

    // --- Batch / durability ---

    /// Atomically apply a batch of write operations across column families.
    fn write_batch(&self, ops: Vec<WriteBatchOp>) -> StorageResult<()>;

    /// Flush the WAL so writes survive process exit.
    fn flush(&self) -> StorageResult<()>;
}
