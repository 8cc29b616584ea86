use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::service::command::{ClaimedJob, FailOutcome};
use crate::service::config::WorkerDefaults;
use crate::service::JobService;

use super::handler::HandlerRegistry;

/// How many times an outcome report (ack/fail) is attempted before the job
/// is abandoned to the stall path.
const REPORT_ATTEMPTS: u32 = 3;
const REPORT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Retry a transient ack/fail error a bounded number of times. Dropping a
/// successful outcome is expensive: the claim expires and the handler runs
/// again from scratch, so a full command channel or a passing storage fault
/// should not be allowed to turn a finished job into a stall.
async fn report_outcome<T, E, F, Fut>(mut op: F, is_transient: fn(&E) -> bool) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < REPORT_ATTEMPTS && is_transient(&err) => {
                warn!(error = %err, attempt, "outcome report failed, retrying");
                attempt += 1;
                tokio::time::sleep(REPORT_RETRY_DELAY).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Lifecycle notifications emitted by a pool after each handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    Completed { job_id: Uuid },
    Retried { job_id: Uuid, attempts_made: u32 },
    DeadLettered { job_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Maximum number of handler invocations in flight at once.
    pub concurrency: usize,
    /// How long `shutdown` waits for in-flight handlers to finish.
    pub shutdown_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::from_defaults(&WorkerDefaults::default())
    }
}

impl WorkerPoolConfig {
    pub fn from_defaults(defaults: &WorkerDefaults) -> Self {
        Self {
            concurrency: defaults.concurrency,
            shutdown_timeout: Duration::from_millis(defaults.shutdown_timeout_ms),
        }
    }
}

/// A pool of handler tasks bound to one queue. The pool registers a bounded
/// channel with the scheduler, pulls claimed jobs off it, and runs the
/// matching handler under a concurrency limit. Each outcome is reported back
/// through `ack`/`fail` so the scheduler settles the claim.
pub struct WorkerPool {
    service: Arc<JobService>,
    worker_id: String,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    shutdown_timeout: Duration,
    events: broadcast::Sender<PoolEvent>,
    task: tokio::task::JoinHandle<()>,
}

impl WorkerPool {
    /// Register with the scheduler and start pulling jobs. The channel
    /// capacity matches the concurrency limit so the scheduler never claims
    /// more jobs than the pool can hold.
    pub fn start(
        service: Arc<JobService>,
        queue: &str,
        registry: HandlerRegistry,
        config: WorkerPoolConfig,
    ) -> Result<Self, DispatchError> {
        let concurrency = config.concurrency.max(1);
        let worker_id = format!("{}-pool-{}", queue, Uuid::now_v7());
        let (tx, rx) = mpsc::channel(concurrency);
        service.register_worker(queue, &worker_id, tx)?;

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let (events, _) = broadcast::channel(64);
        let task = tokio::spawn(Self::run(
            Arc::clone(&service),
            rx,
            registry,
            Arc::clone(&semaphore),
            events.clone(),
        ));

        Ok(Self {
            service,
            worker_id,
            semaphore,
            concurrency,
            shutdown_timeout: config.shutdown_timeout,
            events,
            task,
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Subscribe to per-job outcome events. Slow subscribers may observe
    /// `Lagged` and skip events.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }

    async fn run(
        service: Arc<JobService>,
        mut rx: mpsc::Receiver<ClaimedJob>,
        registry: HandlerRegistry,
        semaphore: Arc<Semaphore>,
        events: broadcast::Sender<PoolEvent>,
    ) {
        // The loop exits when the scheduler drops its sender, which happens
        // on unregister or scheduler shutdown.
        while let Some(job) = rx.recv().await {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let service = Arc::clone(&service);
            let fut = registry.dispatch(job.clone());
            let events = events.clone();
            tokio::spawn(async move {
                let _permit = permit;
                match fut.await {
                    Ok(()) => {
                        debug!(job_id = %job.id, queue = %job.queue, "job completed");
                        let acked = report_outcome(
                            || service.ack(&job.queue, job.id),
                            crate::error::AckError::is_transient,
                        )
                        .await;
                        if let Err(err) = acked {
                            // The claim will expire and the job re-runs.
                            warn!(job_id = %job.id, error = %err, "failed to ack job");
                            return;
                        }
                        let _ = events.send(PoolEvent::Completed { job_id: job.id });
                    }
                    Err(handler_err) => {
                        let info = handler_err.failure_info();
                        debug!(
                            job_id = %job.id,
                            queue = %job.queue,
                            error = %info.message,
                            "job failed"
                        );
                        let failed = report_outcome(
                            || service.fail(&job.queue, job.id, info.clone()),
                            crate::error::FailError::is_transient,
                        )
                        .await;
                        match failed {
                            Ok(FailOutcome::Retried { attempts_made, .. }) => {
                                let _ = events.send(PoolEvent::Retried {
                                    job_id: job.id,
                                    attempts_made,
                                });
                            }
                            Ok(FailOutcome::DeadLettered) => {
                                let _ = events.send(PoolEvent::DeadLettered { job_id: job.id });
                            }
                            Err(err) => {
                                warn!(job_id = %job.id, error = %err, "failed to report job failure");
                            }
                        }
                    }
                }
            });
        }
    }

    /// Stop accepting new jobs and wait for in-flight handlers to finish,
    /// up to the shutdown timeout. Handlers still running past the deadline
    /// keep their claims, which the scheduler reclaims once they expire.
    pub async fn shutdown(self) {
        if let Err(err) = self.service.unregister_worker(&self.worker_id) {
            warn!(worker_id = %self.worker_id, error = %err, "failed to unregister worker");
        }

        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;

        // Unregistering drops the scheduler's sender, closing the channel
        // and letting the pull loop exit on its own.
        if tokio::time::timeout_at(deadline, self.task).await.is_err() {
            warn!(worker_id = %self.worker_id, "pull loop did not stop before the shutdown deadline");
            return;
        }

        // All permits held means all in-flight handlers have finished.
        let drained = tokio::time::timeout_at(
            deadline,
            self.semaphore.acquire_many(self.concurrency as u32),
        )
        .await;
        match drained {
            Ok(Ok(permits)) => drop(permits),
            Ok(Err(_)) => {}
            Err(_) => {
                warn!(
                    worker_id = %self.worker_id,
                    "in-flight jobs did not finish before the shutdown deadline; their claims will expire"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AckError, DispatchError};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn transient_report_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result = report_outcome(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(AckError::Dispatch(DispatchError::ChannelFull))
                    } else {
                        Ok(())
                    }
                }
            },
            AckError::is_transient,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_report_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AckError> = report_outcome(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AckError::JobNotFound("gone".into())) }
            },
            AckError::is_transient,
        )
        .await;
        assert!(matches!(result, Err(AckError::JobNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_report_errors_give_up_after_the_attempt_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AckError> = report_outcome(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AckError::Dispatch(DispatchError::ChannelFull)) }
            },
            AckError::is_transient,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), REPORT_ATTEMPTS);
    }
}
