use std::time::Duration;

use uuid::Uuid;

use crate::dead_letter::DeadLetterRecord;
use crate::error::{
    AckError, CreateQueueError, DeadLetterError, DeleteQueueError, EnqueueError, FailError,
    StatsError,
};
use crate::job::{EnqueueOptions, FailureInfo};
use crate::queue::QueueConfig;
use crate::service::stats::{QueueStats, StatsSnapshot};

/// A claimed job handed to a worker for processing.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub queue: String,
    pub job_type: String,
    pub payload: Vec<u8>,
    pub attempts_made: u32,
    pub max_attempts: u32,
}

/// Outcome of a `Fail` command: either the job was scheduled for another
/// attempt or it exhausted its attempts and went to the dead-letter sink.
#[derive(Debug, Clone, PartialEq)]
pub enum FailOutcome {
    Retried { delay: Duration, attempts_made: u32 },
    DeadLettered,
}

/// Commands sent from IO threads to the single-threaded scheduler core.
///
/// Each variant that expects a response includes a `tokio::sync::oneshot::Sender`
/// for the reply. Fire-and-forget commands omit the reply channel.
pub enum SchedulerCommand {
    Enqueue {
        queue: String,
        job_type: String,
        payload: Vec<u8>,
        options: EnqueueOptions,
        reply: tokio::sync::oneshot::Sender<Result<Uuid, EnqueueError>>,
    },
    Ack {
        queue: String,
        job_id: Uuid,
        reply: tokio::sync::oneshot::Sender<Result<(), AckError>>,
    },
    Fail {
        queue: String,
        job_id: Uuid,
        error: FailureInfo,
        reply: tokio::sync::oneshot::Sender<Result<FailOutcome, FailError>>,
    },
    RegisterWorker {
        queue: String,
        worker_id: String,
        tx: tokio::sync::mpsc::Sender<ClaimedJob>,
    },
    UnregisterWorker {
        worker_id: String,
    },
    CreateQueue {
        config: QueueConfig,
        reply: tokio::sync::oneshot::Sender<Result<String, CreateQueueError>>,
    },
    DeleteQueue {
        queue: String,
        reply: tokio::sync::oneshot::Sender<Result<(), DeleteQueueError>>,
    },
    GetStats {
        queue: String,
        reply: tokio::sync::oneshot::Sender<Result<QueueStats, StatsError>>,
    },
    GetAllStats {
        reply: tokio::sync::oneshot::Sender<Result<StatsSnapshot, StatsError>>,
    },
    ListDeadLetters {
        queue: Option<String>,
        reply: tokio::sync::oneshot::Sender<Result<Vec<DeadLetterRecord>, DeadLetterError>>,
    },
    PurgeDeadLetters {
        queue: Option<String>,
        reply: tokio::sync::oneshot::Sender<Result<u64, DeadLetterError>>,
    },
    Shutdown,
}
