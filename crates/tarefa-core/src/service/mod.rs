pub mod command;
pub mod config;
pub mod metrics;
pub mod rate;
mod scheduler;
pub mod stats;

use std::sync::Arc;
use std::thread;

use tracing::info;
use uuid::Uuid;

use crate::dead_letter::DeadLetterRecord;
use crate::error::{
    AckError, CreateQueueError, DeadLetterError, DeleteQueueError, DispatchError, EnqueueError,
    FailError, ServiceError, StatsError,
};
use crate::job::{EnqueueOptions, FailureInfo};
use crate::queue::QueueConfig;
use crate::storage::Storage;

pub use command::{ClaimedJob, FailOutcome, SchedulerCommand};
pub use config::ServiceConfig;
pub use stats::{QueueStats, StatsSnapshot};

use scheduler::Scheduler;

/// The job service owns the scheduler thread and the inbound command channel.
/// Producers, worker pools, and admin callers send commands through the
/// async API, and the single-threaded scheduler processes them sequentially.
pub struct JobService {
    command_tx: crossbeam_channel::Sender<SchedulerCommand>,
    scheduler_thread: std::sync::Mutex<Option<thread::JoinHandle<()>>>,
}

impl JobService {
    /// Create a new service, spawning the scheduler on a dedicated OS thread.
    pub fn new(config: ServiceConfig, storage: Arc<dyn Storage>) -> Result<Self, ServiceError> {
        let (tx, rx) = crossbeam_channel::bounded::<SchedulerCommand>(
            config.scheduler.command_channel_capacity,
        );

        let scheduler_config = config.scheduler.clone();

        let handle = thread::Builder::new()
            .name("tarefa-scheduler".to_string())
            .spawn(move || {
                let mut scheduler = Scheduler::new(storage, rx, &scheduler_config);
                scheduler.run();
            })
            .map_err(|e| ServiceError::SchedulerSpawn(e.to_string()))?;

        info!("job service started");

        Ok(Self {
            command_tx: tx,
            scheduler_thread: std::sync::Mutex::new(Some(handle)),
        })
    }

    /// Send a command to the scheduler. Returns an error if the channel is
    /// full or disconnected.
    pub fn send_command(&self, cmd: SchedulerCommand) -> Result<(), DispatchError> {
        self.command_tx.try_send(cmd).map_err(|e| match e {
            crossbeam_channel::TrySendError::Full(_) => DispatchError::ChannelFull,
            crossbeam_channel::TrySendError::Disconnected(_) => DispatchError::ChannelDisconnected,
        })
    }

    /// Enqueue a job on the named queue. Returns the assigned job id.
    #[tracing::instrument(skip(self, payload, options))]
    pub async fn enqueue(
        &self,
        queue: &str,
        job_type: &str,
        payload: Vec<u8>,
        options: EnqueueOptions,
    ) -> Result<Uuid, EnqueueError> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.send_command(SchedulerCommand::Enqueue {
            queue: queue.to_string(),
            job_type: job_type.to_string(),
            payload,
            options,
            reply,
        })?;
        reply_rx.await.map_err(|_| DispatchError::ReplyDropped)?
    }

    /// Acknowledge a claimed job as successfully processed.
    #[tracing::instrument(skip(self))]
    pub async fn ack(&self, queue: &str, job_id: Uuid) -> Result<(), AckError> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.send_command(SchedulerCommand::Ack {
            queue: queue.to_string(),
            job_id,
            reply,
        })?;
        reply_rx.await.map_err(|_| DispatchError::ReplyDropped)?
    }

    /// Report a failed attempt for a claimed job. Returns whether the job was
    /// rescheduled or dead-lettered.
    #[tracing::instrument(skip(self, error))]
    pub async fn fail(
        &self,
        queue: &str,
        job_id: Uuid,
        error: FailureInfo,
    ) -> Result<FailOutcome, FailError> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.send_command(SchedulerCommand::Fail {
            queue: queue.to_string(),
            job_id,
            error,
            reply,
        })?;
        reply_rx.await.map_err(|_| DispatchError::ReplyDropped)?
    }

    /// Create a named queue with the given configuration.
    #[tracing::instrument(skip(self, config), fields(queue = %config.name))]
    pub async fn create_queue(&self, config: QueueConfig) -> Result<String, CreateQueueError> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.send_command(SchedulerCommand::CreateQueue { config, reply })?;
        reply_rx.await.map_err(|_| DispatchError::ReplyDropped)?
    }

    /// Delete a queue and its jobs. Dead-letter records are retained.
    #[tracing::instrument(skip(self))]
    pub async fn delete_queue(&self, queue: &str) -> Result<(), DeleteQueueError> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.send_command(SchedulerCommand::DeleteQueue {
            queue: queue.to_string(),
            reply,
        })?;
        reply_rx.await.map_err(|_| DispatchError::ReplyDropped)?
    }

    /// Point-in-time counts for one queue.
    #[tracing::instrument(skip(self))]
    pub async fn queue_stats(&self, queue: &str) -> Result<QueueStats, StatsError> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.send_command(SchedulerCommand::GetStats {
            queue: queue.to_string(),
            reply,
        })?;
        reply_rx.await.map_err(|_| DispatchError::ReplyDropped)?
    }

    /// Aggregate snapshot across all queues. Queues whose counts cannot be
    /// computed appear in `unavailable` rather than failing the call.
    #[tracing::instrument(skip(self))]
    pub async fn stats(&self) -> Result<StatsSnapshot, StatsError> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.send_command(SchedulerCommand::GetAllStats { reply })?;
        reply_rx.await.map_err(|_| DispatchError::ReplyDropped)?
    }

    /// List dead-letter records, optionally filtered by origin queue.
    #[tracing::instrument(skip(self))]
    pub async fn list_dead_letters(
        &self,
        queue: Option<&str>,
    ) -> Result<Vec<DeadLetterRecord>, DeadLetterError> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.send_command(SchedulerCommand::ListDeadLetters {
            queue: queue.map(|s| s.to_string()),
            reply,
        })?;
        reply_rx.await.map_err(|_| DispatchError::ReplyDropped)?
    }

    /// Remove dead-letter records, optionally filtered by origin queue.
    /// Returns the number purged. This is the only path that removes records
    /// from the sink.
    #[tracing::instrument(skip(self))]
    pub async fn purge_dead_letters(&self, queue: Option<&str>) -> Result<u64, DeadLetterError> {
        let (reply, reply_rx) = tokio::sync::oneshot::channel();
        self.send_command(SchedulerCommand::PurgeDeadLetters {
            queue: queue.map(|s| s.to_string()),
            reply,
        })?;
        reply_rx.await.map_err(|_| DispatchError::ReplyDropped)?
    }

    /// Register a worker channel for a queue. Used by `WorkerPool`.
    pub fn register_worker(
        &self,
        queue: &str,
        worker_id: &str,
        tx: tokio::sync::mpsc::Sender<ClaimedJob>,
    ) -> Result<(), DispatchError> {
        self.send_command(SchedulerCommand::RegisterWorker {
            queue: queue.to_string(),
            worker_id: worker_id.to_string(),
            tx,
        })
    }

    /// Unregister a worker channel. Used by `WorkerPool` during shutdown.
    pub fn unregister_worker(&self, worker_id: &str) -> Result<(), DispatchError> {
        self.send_command(SchedulerCommand::UnregisterWorker {
            worker_id: worker_id.to_string(),
        })
    }

    /// Initiate graceful shutdown: send the shutdown command and wait for the
    /// scheduler thread to finish.
    #[tracing::instrument(skip_all)]
    pub fn shutdown(&self) -> Result<(), ServiceError> {
        info!("initiating job service shutdown");

        // Send shutdown command (ignore error if channel already closed)
        let _ = self.command_tx.send(SchedulerCommand::Shutdown);

        // Wait for the scheduler thread to finish
        let handle = self
            .scheduler_thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.join().map_err(|_| ServiceError::SchedulerPanicked)?;
        }

        info!("job service shutdown complete");
        Ok(())
    }
}

impl Drop for JobService {
    fn drop(&mut self) {
        // If shutdown wasn't called explicitly, attempt to stop the scheduler
        let handle = self
            .scheduler_thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = self.command_tx.send(SchedulerCommand::Shutdown);
            let _ = handle.join();
        }
    }
}
