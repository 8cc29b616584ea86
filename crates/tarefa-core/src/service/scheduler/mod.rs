use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffPolicy;
use crate::queue::QueueConfig;
use crate::service::command::{ClaimedJob, SchedulerCommand};
use crate::service::config::SchedulerConfig;
use crate::service::metrics::Metrics;
use crate::service::rate::TokenBucket;
use crate::storage::{Storage, WriteBatchOp};

mod delivery;
mod handlers;
mod stats_handlers;
mod timers;

/// A registered worker waiting for jobs.
pub(super) struct WorkerEntry {
    pub(super) queue: String,
    pub(super) tx: tokio::sync::mpsc::Sender<ClaimedJob>,
}

/// Per-queue runtime state derived from the persisted `QueueConfig`:
/// the materialized backoff policy and the optional rate limiter.
pub(super) struct QueueRuntime {
    pub(super) config: QueueConfig,
    pub(super) backoff: Box<dyn BackoffPolicy>,
    pub(super) limiter: Option<TokenBucket>,
}

impl QueueRuntime {
    pub(super) fn from_config(config: QueueConfig) -> Self {
        let backoff = config.backoff.policy();
        let limiter = config.rate_limit.as_ref().map(TokenBucket::from_limit);
        Self {
            config,
            backoff,
            limiter,
        }
    }
}

/// An entry in the per-queue pending job index.
/// Tracks jobs available for delivery (not currently claimed).
pub(super) struct PendingEntry {
    pub(super) job_key: Vec<u8>,
    pub(super) job_id: uuid::Uuid,
}

/// Epoch nanoseconds.
pub(super) fn now_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Epoch-ns deadline for a delay from `now`. Saturates instead of wrapping,
/// so an oversized delay parks at the far end of the scan range rather than
/// becoming due immediately.
pub(super) fn deadline_ns(now: u64, delay: Duration) -> u64 {
    now.saturating_add(u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX))
}

/// Single-threaded scheduler core. Owns all mutable scheduler state and
/// processes commands from IO threads via a crossbeam channel.
pub struct Scheduler {
    storage: Arc<dyn Storage>,
    inbound: Receiver<SchedulerCommand>,
    idle_timeout: Duration,
    running: bool,
    workers: HashMap<String, WorkerEntry>,
    /// Per-queue round-robin index for delivering jobs to workers.
    /// Persists across calls so jobs are distributed fairly across
    /// workers within each queue independently.
    worker_rr_idx: HashMap<String, usize>,
    /// Per-queue runtime state (config, backoff policy, rate limiter).
    queues: HashMap<String, QueueRuntime>,
    /// Per-queue FIFO of pending (unclaimed) jobs.
    pending: HashMap<String, VecDeque<PendingEntry>>,
    /// Storage key for in-flight (claimed) jobs, for O(1) lookup on ack/fail.
    claimed_job_keys: HashMap<uuid::Uuid, Vec<u8>>,
    /// OTel metrics for recording counters and gauges.
    metrics: Metrics,
}

impl Scheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        inbound: Receiver<SchedulerCommand>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            storage,
            inbound,
            idle_timeout: Duration::from_millis(config.idle_timeout_ms),
            running: true,
            workers: HashMap::new(),
            worker_rr_idx: HashMap::new(),
            queues: HashMap::new(),
            pending: HashMap::new(),
            claimed_job_keys: HashMap::new(),
            metrics: Metrics::new(),
        }
    }

    /// Run the scheduler event loop. This blocks the current thread until
    /// a `Shutdown` command is received or the inbound channel is disconnected.
    pub fn run(&mut self) {
        info!("scheduler started");
        self.recover();

        while self.running {
            // Phase 1: Drain all buffered commands (non-blocking)
            let mut drained = 0;
            while let Ok(cmd) = self.inbound.try_recv() {
                self.handle_command(cmd);
                drained += 1;
                if !self.running {
                    break;
                }
            }

            // Phase 2: Periodic work, then a delivery round.
            self.refill_limiters(Instant::now());
            self.promote_due_delayed();
            self.reclaim_expired_claims();
            self.deliver_all();

            // Record gauge metrics after state changes.
            self.record_gauges();

            if !self.running {
                break;
            }

            // Phase 3: Park until next command or timeout
            if drained == 0 {
                match self.inbound.recv_timeout(self.idle_timeout) {
                    Ok(cmd) => self.handle_command(cmd),
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                        // Idle tick: retention pruning, then re-deliver if
                        // periodic work freed anything up.
                        self.prune_completed();
                        if self.promote_due_delayed() + self.reclaim_expired_claims() > 0 {
                            self.refill_limiters(Instant::now());
                            self.deliver_all();
                        }
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                        info!("inbound channel disconnected, shutting down");
                        self.running = false;
                    }
                }
            }
        }

        // Flush the WAL to ensure all writes are durable before exit
        if let Err(e) = self.storage.flush() {
            warn!(error = %e, "failed to flush WAL during shutdown");
        }

        info!("scheduler stopped");
    }

    fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::Enqueue {
                queue,
                job_type,
                payload,
                options,
                reply,
            } => {
                debug!(%queue, %job_type, "enqueue command received");
                let result = self.handle_enqueue(&queue, job_type, payload, options);
                let _ = reply.send(result);
                // Deliver immediately for responsiveness
                self.deliver_queue(&queue);
            }
            SchedulerCommand::Ack {
                queue,
                job_id,
                reply,
            } => {
                debug!(%queue, %job_id, "ack command received");
                let result = self.handle_ack(&queue, &job_id);
                let _ = reply.send(result);
            }
            SchedulerCommand::Fail {
                queue,
                job_id,
                error,
                reply,
            } => {
                debug!(%queue, %job_id, error = %error.message, "fail command received");
                let result = self.handle_fail(&queue, &job_id, error);
                let _ = reply.send(result);
            }
            SchedulerCommand::RegisterWorker {
                queue,
                worker_id,
                tx,
            } => {
                info!(%queue, %worker_id, "worker registered");
                self.workers.insert(
                    worker_id,
                    WorkerEntry {
                        queue: queue.clone(),
                        tx,
                    },
                );
                // Deliver pending jobs to the newly registered worker
                self.deliver_queue(&queue);
            }
            SchedulerCommand::UnregisterWorker { worker_id } => {
                info!(%worker_id, "worker unregistered");
                self.workers.remove(&worker_id);
            }
            SchedulerCommand::CreateQueue { config, reply } => {
                info!(queue = %config.name, "create queue command received");
                let result = self.handle_create_queue(config);
                let _ = reply.send(result);
            }
            SchedulerCommand::DeleteQueue { queue, reply } => {
                info!(%queue, "delete queue command received");
                let result = self.handle_delete_queue(&queue);
                let _ = reply.send(result);
            }
            SchedulerCommand::GetStats { queue, reply } => {
                let result = self.handle_queue_stats(&queue);
                let _ = reply.send(result);
            }
            SchedulerCommand::GetAllStats { reply } => {
                let result = self.handle_all_stats();
                let _ = reply.send(result);
            }
            SchedulerCommand::ListDeadLetters { queue, reply } => {
                let result = self.handle_list_dead_letters(queue.as_deref());
                let _ = reply.send(result);
            }
            SchedulerCommand::PurgeDeadLetters { queue, reply } => {
                info!(queue = queue.as_deref().unwrap_or("*"), "purge dead letters command received");
                let result = self.handle_purge_dead_letters(queue.as_deref());
                let _ = reply.send(result);
            }
            SchedulerCommand::Shutdown => {
                info!("shutdown command received, draining remaining commands");
                self.running = false;
            }
        }
    }

    /// Refill all configured per-queue rate limiters.
    fn refill_limiters(&mut self, now: Instant) {
        for runtime in self.queues.values_mut() {
            if let Some(limiter) = runtime.limiter.as_mut() {
                limiter.refill(now);
            }
        }
    }

    /// Record waiting/active gauges for every known queue.
    fn record_gauges(&self) {
        for name in self.queues.keys() {
            let waiting = self.pending.get(name).map(|q| q.len() as u64).unwrap_or(0);
            let prefix = crate::storage::keys::job_prefix(name);
            let active = self
                .claimed_job_keys
                .values()
                .filter(|key| key.starts_with(&prefix))
                .count() as u64;
            self.metrics.set_queue_waiting(name, waiting);
            self.metrics.set_claims_active(name, active);
        }
    }

    /// Access the storage layer (used by tests).
    #[cfg(test)]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }
}

#[cfg(test)]
mod tests;
