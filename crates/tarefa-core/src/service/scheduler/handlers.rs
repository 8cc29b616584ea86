use super::*;

use crate::job::{EnqueueOptions, FailureInfo, Job};
use crate::service::command::FailOutcome;
use crate::storage::CompletedRecord;

impl Scheduler {
    pub(super) fn handle_enqueue(
        &mut self,
        queue: &str,
        job_type: String,
        payload: Vec<u8>,
        options: EnqueueOptions,
    ) -> Result<uuid::Uuid, crate::error::EnqueueError> {
        let Some(runtime) = self.queues.get(queue) else {
            return Err(crate::error::EnqueueError::QueueNotFound(queue.to_string()));
        };

        let created_at = now_ns();
        let job = Job {
            id: Job::new_id(),
            queue: queue.to_string(),
            job_type,
            payload,
            attempts_made: 0,
            max_attempts: options
                .max_attempts
                .unwrap_or(runtime.config.default_max_attempts)
                .max(1),
            created_at,
            last_error: None,
        };
        let job_id = job.id;

        let delay = options.initial_delay.unwrap_or_default();
        if delay.is_zero() {
            let key = crate::storage::keys::job_key(queue, created_at, &job_id);
            self.storage.put_job(&key, &job)?;
            self.pending_push(queue, PendingEntry { job_key: key, job_id });
        } else {
            // Delayed jobs live only in the delayed CF until promotion.
            let visible_at = deadline_ns(created_at, delay);
            let key = crate::storage::keys::delayed_key(visible_at, queue, &job_id);
            let value = serde_json::to_vec(&job).map_err(crate::error::StorageError::from)?;
            self.storage
                .write_batch(vec![WriteBatchOp::PutDelayed { key, value }])?;
        }

        self.metrics.record_enqueue(queue);
        Ok(job_id)
    }

    pub(super) fn handle_create_queue(
        &mut self,
        config: crate::queue::QueueConfig,
    ) -> Result<String, crate::error::CreateQueueError> {
        let name = config.name.clone();
        if name.is_empty() {
            return Err(crate::error::CreateQueueError::InvalidConfig(
                "queue name must not be empty".into(),
            ));
        }
        // Key encoding length-prefixes strings with a u16.
        if name.len() > usize::from(u16::MAX) {
            return Err(crate::error::CreateQueueError::InvalidConfig(
                "queue name must be at most 65535 bytes".into(),
            ));
        }
        if config.claim_timeout_ms == 0 {
            return Err(crate::error::CreateQueueError::InvalidConfig(
                "claim_timeout_ms must be at least 1".into(),
            ));
        }
        if config.default_max_attempts == 0 {
            return Err(crate::error::CreateQueueError::InvalidConfig(
                "default_max_attempts must be at least 1".into(),
            ));
        }
        if let Some(limit) = &config.rate_limit {
            if limit.max_jobs == 0 || limit.window_ms == 0 {
                return Err(crate::error::CreateQueueError::InvalidConfig(
                    "rate_limit max_jobs and window_ms must be at least 1".into(),
                ));
            }
        }

        // Check-then-put is safe: the scheduler is single-threaded, so no
        // concurrent command can create the same queue between the check and
        // the put. RocksDB put is an upsert, so the explicit check is the
        // only way to enforce uniqueness.
        if self.storage.get_queue(&name)?.is_some() {
            return Err(crate::error::CreateQueueError::QueueAlreadyExists(name));
        }

        self.storage.put_queue(&name, &config)?;
        self.queues
            .insert(name.clone(), QueueRuntime::from_config(config));
        Ok(name)
    }

    pub(super) fn handle_delete_queue(
        &mut self,
        queue: &str,
    ) -> Result<(), crate::error::DeleteQueueError> {
        // Check-then-delete is safe: same single-threaded guarantee as above.
        // RocksDB delete is a no-op on missing keys, so the explicit check is
        // the only way to return a meaningful NotFound error.
        if self.storage.get_queue(queue)?.is_none() {
            return Err(crate::error::DeleteQueueError::QueueNotFound(
                queue.to_string(),
            ));
        }

        let mut ops = Vec::new();
        let prefix = crate::storage::keys::job_prefix(queue);

        // Waiting and claimed jobs
        for (key, job) in self.storage.list_jobs(&prefix)? {
            let claim_key = crate::storage::keys::claim_key(queue, &job.id);
            if let Some(claim_value) = self.storage.get_claim(&claim_key)? {
                if let Some(expiry_ns) =
                    crate::storage::keys::parse_expiry_from_claim_value(&claim_value)
                {
                    ops.push(WriteBatchOp::DeleteClaimExpiry {
                        key: crate::storage::keys::claim_expiry_key(expiry_ns, queue, &job.id),
                    });
                }
                ops.push(WriteBatchOp::DeleteClaim { key: claim_key });
            }
            ops.push(WriteBatchOp::DeleteJob { key });
        }

        // Delayed jobs belonging to this queue
        for (key, job) in self.storage.list_delayed()? {
            if job.queue == queue {
                ops.push(WriteBatchOp::DeleteDelayed { key });
            }
        }

        // Completed records (dead letters are intentionally retained)
        for (key, _) in self
            .storage
            .list_completed(&crate::storage::keys::completed_prefix(queue))?
        {
            ops.push(WriteBatchOp::DeleteCompleted { key });
        }

        // The config goes in the same batch as the rows. If the batch fails,
        // the queue still exists in full and the delete can be retried; the
        // in-memory maps are only touched once storage has committed.
        ops.push(WriteBatchOp::DeleteQueueConfig {
            queue: queue.to_string(),
        });
        self.storage.write_batch(ops)?;

        self.queues.remove(queue);
        self.pending.remove(queue);
        self.worker_rr_idx.remove(queue);
        self.claimed_job_keys
            .retain(|_, job_key| !job_key.starts_with(&prefix));

        Ok(())
    }

    pub(super) fn handle_ack(
        &mut self,
        queue: &str,
        job_id: &uuid::Uuid,
    ) -> Result<(), crate::error::AckError> {
        // Look up the claim — if it doesn't exist, the job is unknown or already acked
        let claim_key = crate::storage::keys::claim_key(queue, job_id);
        let claim_value = self.storage.get_claim(&claim_key)?.ok_or_else(|| {
            crate::error::AckError::JobNotFound(format!(
                "no claim for job {job_id} in queue {queue}"
            ))
        })?;

        // Parse expiry timestamp from claim value to construct the claim_expiry key
        let expiry_ns = crate::storage::keys::parse_expiry_from_claim_value(&claim_value)
            .ok_or_else(|| {
                crate::error::AckError::QueueUnavailable(crate::error::StorageError::CorruptData(
                    format!("claim value: cannot parse expiry for job {job_id} in queue {queue}"),
                ))
            })?;
        let expiry_key = crate::storage::keys::claim_expiry_key(expiry_ns, queue, job_id);

        // Look up the job key from the claimed index (O(1)), falling back to scan
        let job_key = self
            .claimed_job_keys
            .remove(job_id)
            .or_else(|| self.find_job_key(queue, job_id).ok().flatten());

        // Atomically delete the job, claim, and claim expiry, and append a
        // completed record for inspection.
        let mut ops = vec![
            WriteBatchOp::DeleteClaim { key: claim_key },
            WriteBatchOp::DeleteClaimExpiry { key: expiry_key },
        ];
        if let Some(key) = job_key {
            if let Some(job) = self.storage.get_job(&key)? {
                let completed_at = now_ns();
                let record = CompletedRecord {
                    job_id: job.id,
                    job_type: job.job_type,
                    completed_at,
                    attempts_made: job.attempts_made,
                };
                let value = serde_json::to_vec(&record).map_err(crate::error::StorageError::from)?;
                ops.push(WriteBatchOp::PutCompleted {
                    key: crate::storage::keys::completed_key(queue, completed_at, job_id),
                    value,
                });
            }
            ops.push(WriteBatchOp::DeleteJob { key });
        }

        self.storage.write_batch(ops)?;
        self.metrics.record_complete(queue);
        Ok(())
    }

    pub(super) fn handle_fail(
        &mut self,
        queue: &str,
        job_id: &uuid::Uuid,
        error: FailureInfo,
    ) -> Result<FailOutcome, crate::error::FailError> {
        // Look up the claim — if it doesn't exist, the job was never claimed
        // or already acked/failed
        let claim_key = crate::storage::keys::claim_key(queue, job_id);
        let claim_value = self.storage.get_claim(&claim_key)?.ok_or_else(|| {
            crate::error::FailError::JobNotFound(format!(
                "no claim for job {job_id} in queue {queue}"
            ))
        })?;

        let expiry_ns = crate::storage::keys::parse_expiry_from_claim_value(&claim_value)
            .ok_or_else(|| {
                crate::error::FailError::QueueUnavailable(crate::error::StorageError::CorruptData(
                    format!("claim value: cannot parse expiry for job {job_id} in queue {queue}"),
                ))
            })?;
        let expiry_key = crate::storage::keys::claim_expiry_key(expiry_ns, queue, job_id);

        // Look up the job key from the claimed index (O(1)), falling back to scan
        let job_key = self
            .claimed_job_keys
            .remove(job_id)
            .or_else(|| self.find_job_key(queue, job_id).ok().flatten())
            .ok_or_else(|| {
                crate::error::FailError::JobNotFound(format!(
                    "job {job_id} not found in queue {queue}"
                ))
            })?;
        let mut job = self.storage.get_job(&job_key)?.ok_or_else(|| {
            crate::error::FailError::JobNotFound(format!(
                "job {job_id} not found in queue {queue}"
            ))
        })?;

        // A failed invocation consumes exactly one attempt
        job.attempts_made += 1;
        job.last_error = Some(error.clone());
        self.metrics.record_fail(queue);

        if job.attempts_made >= job.max_attempts {
            // Attempts exhausted: move the job to the dead-letter sink
            let failed_at = now_ns();
            let record = crate::dead_letter::DeadLetterRecord::from_job(&job, &error, failed_at);
            let record_value =
                serde_json::to_vec(&record).map_err(crate::error::StorageError::from)?;
            let record_key =
                crate::storage::keys::dead_letter_key(queue, failed_at, &uuid::Uuid::now_v7());

            let ops = vec![
                WriteBatchOp::DeleteJob { key: job_key },
                WriteBatchOp::DeleteClaim { key: claim_key },
                WriteBatchOp::DeleteClaimExpiry { key: expiry_key },
                WriteBatchOp::PutDeadLetter {
                    key: record_key,
                    value: record_value,
                },
            ];
            if let Err(e) = self.storage.write_batch(ops) {
                // The record is lost if this write fails — log everything a
                // human needs to reconstruct it.
                error!(
                    %queue,
                    %job_id,
                    job_type = %job.job_type,
                    attempts_made = job.attempts_made,
                    failed_reason = %error.message,
                    error = %e,
                    "failed to write dead-letter record"
                );
                return Err(e.into());
            }

            self.metrics.record_dead_letter(queue);
            debug!(
                %queue,
                %job_id,
                attempts_made = job.attempts_made,
                "job moved to dead-letter sink"
            );
            return Ok(FailOutcome::DeadLettered);
        }

        // Retry path: schedule the next attempt through the delayed CF.
        // Attempt N's delay is indexed by N-1 (the first retry uses index 0).
        let delay = self
            .queues
            .get(queue)
            .map(|runtime| runtime.backoff.delay(job.attempts_made - 1))
            .unwrap_or_default();
        // Key by a fresh UUIDv7, not the job id — the job id dates from
        // enqueue time, so reusing it would break equal deadlines in
        // original-enqueue order instead of fail order. The id is recovered
        // from the value at promotion.
        let visible_at = deadline_ns(now_ns(), delay);
        let delayed_key =
            crate::storage::keys::delayed_key(visible_at, queue, &uuid::Uuid::now_v7());
        let job_value = serde_json::to_vec(&job).map_err(crate::error::StorageError::from)?;

        self.storage.write_batch(vec![
            WriteBatchOp::DeleteJob { key: job_key },
            WriteBatchOp::DeleteClaim { key: claim_key },
            WriteBatchOp::DeleteClaimExpiry { key: expiry_key },
            WriteBatchOp::PutDelayed {
                key: delayed_key,
                value: job_value,
            },
        ])?;

        self.metrics.record_retry(queue);
        debug!(
            %queue,
            %job_id,
            attempts_made = job.attempts_made,
            delay_ms = delay.as_millis() as u64,
            "fail processed, retry scheduled"
        );
        Ok(FailOutcome::Retried {
            delay,
            attempts_made: job.attempts_made,
        })
    }
}
