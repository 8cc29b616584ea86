use super::*;

pub(super) fn test_setup() -> (
    crossbeam_channel::Sender<SchedulerCommand>,
    Scheduler,
    tempfile::TempDir,
) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(RocksDbStorage::open(dir.path()).unwrap());
    let config = SchedulerConfig {
        command_channel_capacity: 256,
        idle_timeout_ms: 10,
    };
    let (tx, rx) = crossbeam_channel::bounded(config.command_channel_capacity);
    let scheduler = Scheduler::new(storage, rx, &config);
    (tx, scheduler, dir)
}

/// Helper: create a scheduler sharing an existing storage (for restart tests).
pub(super) fn test_setup_with_storage(
    storage: Arc<dyn Storage>,
) -> (crossbeam_channel::Sender<SchedulerCommand>, Scheduler) {
    let config = SchedulerConfig {
        command_channel_capacity: 256,
        idle_timeout_ms: 10,
    };
    let (tx, rx) = crossbeam_channel::bounded(config.command_channel_capacity);
    let scheduler = Scheduler::new(storage, rx, &config);
    (tx, scheduler)
}

/// Helper: send a CreateQueue command so enqueue tests have an existing queue.
pub(super) fn send_create_queue(tx: &crossbeam_channel::Sender<SchedulerCommand>, name: &str) {
    send_create_queue_with(tx, QueueConfig::new(name));
}

pub(super) fn send_create_queue_with(
    tx: &crossbeam_channel::Sender<SchedulerCommand>,
    config: QueueConfig,
) {
    let (reply_tx, _reply_rx) = tokio::sync::oneshot::channel();
    tx.send(SchedulerCommand::CreateQueue {
        config,
        reply: reply_tx,
    })
    .unwrap();
}

/// Helper: queue config with a fast backoff table, for retry-path tests.
pub(super) fn queue_with_backoff(name: &str, delays_ms: Vec<u64>) -> QueueConfig {
    let mut config = QueueConfig::new(name);
    config.backoff = crate::backoff::BackoffConfig::Table { delays_ms };
    config
}

/// Helper: send an Enqueue command, returning the reply receiver.
pub(super) fn send_enqueue(
    tx: &crossbeam_channel::Sender<SchedulerCommand>,
    queue: &str,
    job_type: &str,
) -> tokio::sync::oneshot::Receiver<Result<Uuid, crate::error::EnqueueError>> {
    send_enqueue_with(tx, queue, job_type, EnqueueOptions::default())
}

pub(super) fn send_enqueue_with(
    tx: &crossbeam_channel::Sender<SchedulerCommand>,
    queue: &str,
    job_type: &str,
    options: EnqueueOptions,
) -> tokio::sync::oneshot::Receiver<Result<Uuid, crate::error::EnqueueError>> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    tx.send(SchedulerCommand::Enqueue {
        queue: queue.to_string(),
        job_type: job_type.to_string(),
        payload: vec![1, 2, 3],
        options,
        reply: reply_tx,
    })
    .unwrap();
    reply_rx
}

/// Helper: register a worker channel with the given capacity and return the
/// receiving end.
pub(super) fn register_worker(
    tx: &crossbeam_channel::Sender<SchedulerCommand>,
    queue: &str,
    worker_id: &str,
    capacity: usize,
) -> tokio::sync::mpsc::Receiver<crate::service::command::ClaimedJob> {
    let (worker_tx, worker_rx) = tokio::sync::mpsc::channel(capacity);
    tx.send(SchedulerCommand::RegisterWorker {
        queue: queue.to_string(),
        worker_id: worker_id.to_string(),
        tx: worker_tx,
    })
    .unwrap();
    worker_rx
}

/// Helper: drain all buffered commands, run periodic work, and run a
/// delivery round.
impl Scheduler {
    #[cfg(test)]
    pub(super) fn handle_all_pending(&mut self) {
        while let Ok(cmd) = self.inbound.try_recv() {
            self.handle_command(cmd);
        }
        self.refill_limiters(Instant::now());
        self.promote_due_delayed();
        self.reclaim_expired_claims();
        self.deliver_all();
    }
}

/// Storage wrapper that fails the next N `write_batch` calls, for testing
/// the error branches of multi-row transitions.
pub(super) struct FailingBatchStorage {
    inner: RocksDbStorage,
    fail_next_batches: std::sync::atomic::AtomicU32,
}

impl FailingBatchStorage {
    pub(super) fn open(path: &std::path::Path) -> Self {
        Self {
            inner: RocksDbStorage::open(path).unwrap(),
            fail_next_batches: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub(super) fn fail_next_batch(&self) {
        self.fail_next_batches
            .store(1, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Storage for FailingBatchStorage {
    fn put_job(&self, key: &[u8], job: &crate::job::Job) -> crate::error::StorageResult<()> {
        self.inner.put_job(key, job)
    }

    fn get_job(&self, key: &[u8]) -> crate::error::StorageResult<Option<crate::job::Job>> {
        self.inner.get_job(key)
    }

    fn delete_job(&self, key: &[u8]) -> crate::error::StorageResult<()> {
        self.inner.delete_job(key)
    }

    fn list_jobs(
        &self,
        prefix: &[u8],
    ) -> crate::error::StorageResult<Vec<(Vec<u8>, crate::job::Job)>> {
        self.inner.list_jobs(prefix)
    }

    fn put_claim(&self, key: &[u8], value: &[u8]) -> crate::error::StorageResult<()> {
        self.inner.put_claim(key, value)
    }

    fn get_claim(&self, key: &[u8]) -> crate::error::StorageResult<Option<Vec<u8>>> {
        self.inner.get_claim(key)
    }

    fn delete_claim(&self, key: &[u8]) -> crate::error::StorageResult<()> {
        self.inner.delete_claim(key)
    }

    fn list_expired_claims(&self, up_to_key: &[u8]) -> crate::error::StorageResult<Vec<Vec<u8>>> {
        self.inner.list_expired_claims(up_to_key)
    }

    fn list_due_delayed(
        &self,
        up_to_key: &[u8],
    ) -> crate::error::StorageResult<Vec<(Vec<u8>, crate::job::Job)>> {
        self.inner.list_due_delayed(up_to_key)
    }

    fn list_delayed(&self) -> crate::error::StorageResult<Vec<(Vec<u8>, crate::job::Job)>> {
        self.inner.list_delayed()
    }

    fn list_completed(
        &self,
        prefix: &[u8],
    ) -> crate::error::StorageResult<Vec<(Vec<u8>, crate::storage::CompletedRecord)>> {
        self.inner.list_completed(prefix)
    }

    fn put_dead_letter(
        &self,
        key: &[u8],
        record: &crate::dead_letter::DeadLetterRecord,
    ) -> crate::error::StorageResult<()> {
        self.inner.put_dead_letter(key, record)
    }

    fn list_dead_letters(
        &self,
        prefix: &[u8],
    ) -> crate::error::StorageResult<Vec<(Vec<u8>, crate::dead_letter::DeadLetterRecord)>> {
        self.inner.list_dead_letters(prefix)
    }

    fn list_all_dead_letters(
        &self,
    ) -> crate::error::StorageResult<Vec<(Vec<u8>, crate::dead_letter::DeadLetterRecord)>> {
        self.inner.list_all_dead_letters()
    }

    fn put_queue(&self, queue: &str, config: &QueueConfig) -> crate::error::StorageResult<()> {
        self.inner.put_queue(queue, config)
    }

    fn get_queue(&self, queue: &str) -> crate::error::StorageResult<Option<QueueConfig>> {
        self.inner.get_queue(queue)
    }

    fn delete_queue(&self, queue: &str) -> crate::error::StorageResult<()> {
        self.inner.delete_queue(queue)
    }

    fn list_queues(&self) -> crate::error::StorageResult<Vec<QueueConfig>> {
        self.inner.list_queues()
    }

    fn write_batch(
        &self,
        ops: Vec<crate::storage::WriteBatchOp>,
    ) -> crate::error::StorageResult<()> {
        let armed = &self.fail_next_batches;
        if armed
            .fetch_update(
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
                |n| n.checked_sub(1),
            )
            .is_ok()
        {
            return Err(crate::error::StorageError::RocksDb(
                "injected write_batch failure".to_string(),
            ));
        }
        self.inner.write_batch(ops)
    }

    fn flush(&self) -> crate::error::StorageResult<()> {
        self.inner.flush()
    }
}
