pub mod backoff;
pub mod dead_letter;
pub mod error;
pub mod job;
pub mod queue;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod worker;

pub use backoff::{BackoffConfig, BackoffPolicy, ExponentialBackoff, RetryTable};
pub use dead_letter::DeadLetterRecord;
pub use error::{StorageError, StorageResult};
pub use job::{EnqueueOptions, FailureInfo, Job};
pub use queue::QueueConfig;
pub use service::{ClaimedJob, FailOutcome, JobService, QueueStats, ServiceConfig, StatsSnapshot};
pub use storage::{RocksDbStorage, Storage, WriteBatchOp};
pub use worker::{HandlerError, HandlerRegistry, PoolEvent, WorkerPool, WorkerPoolConfig};
