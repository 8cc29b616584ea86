use super::*;

use crate::service::command::ClaimedJob;

impl Scheduler {
    /// Find the full job key in the jobs CF by scanning the queue prefix.
    pub(super) fn find_job_key(
        &self,
        queue: &str,
        job_id: &uuid::Uuid,
    ) -> Result<Option<Vec<u8>>, crate::error::StorageError> {
        let prefix = crate::storage::keys::job_prefix(queue);
        let jobs = self.storage.list_jobs(&prefix)?;
        for (key, job) in jobs {
            if job.id == *job_id {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    /// Add a job to the back of the queue's pending FIFO.
    pub(super) fn pending_push(&mut self, queue: &str, entry: PendingEntry) {
        self.pending
            .entry(queue.to_string())
            .or_default()
            .push_back(entry);
    }

    /// Run one delivery round across all queues that have pending jobs and
    /// registered workers.
    pub(super) fn deliver_all(&mut self) {
        let queues: Vec<String> = self
            .pending
            .iter()
            .filter(|(queue, entries)| {
                !entries.is_empty() && self.workers.values().any(|w| w.queue == **queue)
            })
            .map(|(queue, _)| queue.clone())
            .collect();

        for queue in &queues {
            self.deliver_queue(queue);
        }
    }

    /// Deliver pending jobs for a single queue in FIFO order until the
    /// pending index is drained, the rate limiter runs out of tokens, or
    /// no worker can accept.
    pub(super) fn deliver_queue(&mut self, queue: &str) {
        let has_workers = self.workers.values().any(|w| w.queue == queue);
        if !has_workers {
            return;
        }

        let Some(runtime) = self.queues.get(queue) else {
            return;
        };
        let claim_timeout_ms = runtime.config.claim_timeout_ms;

        loop {
            // Rate check (peek only — tokens are consumed after a successful
            // delivery): when the bucket is empty jobs simply stay waiting.
            if let Some(limiter) = self.queues.get(queue).and_then(|r| r.limiter.as_ref()) {
                if !limiter.peek() {
                    break;
                }
            }

            let Some(entry) = self.pending.get_mut(queue).and_then(|q| q.pop_front()) else {
                break;
            };

            // Load the full job from storage
            let job = match self.storage.get_job(&entry.job_key) {
                Ok(Some(job)) => job,
                Ok(None) => {
                    warn!(%queue, job_id = %entry.job_id, "pending job not found in storage, skipping");
                    continue;
                }
                Err(e) => {
                    error!(%queue, job_id = %entry.job_id, error = %e, "failed to read pending job");
                    // Put the entry back so we don't lose it
                    self.pending
                        .entry(queue.to_string())
                        .or_default()
                        .push_front(entry);
                    break;
                }
            };

            let claim_key = crate::storage::keys::claim_key(queue, &job.id);
            if self.try_deliver_to_worker(queue, &job, &claim_key, claim_timeout_ms) {
                self.metrics.record_claim(queue);
                if let Some(limiter) = self.queues.get_mut(queue).and_then(|r| r.limiter.as_mut())
                {
                    limiter.try_consume(1.0);
                }
                // Track the storage key for O(1) lookup on ack/fail
                self.claimed_job_keys.insert(entry.job_id, entry.job_key);
            } else {
                // Couldn't deliver (all worker channels full/closed).
                // Put the entry back at the front of the pending queue.
                // No rate tokens were consumed (peek-only check above).
                self.pending
                    .entry(queue.to_string())
                    .or_default()
                    .push_front(entry);
                break;
            }
        }
    }

    /// Attempt to deliver a single job to a worker via round-robin.
    /// The claim is written durably before the send and rolled back if no
    /// worker accepts, so a crash mid-delivery surfaces as a stall, never a
    /// double delivery. Returns true if delivery succeeded.
    fn try_deliver_to_worker(
        &mut self,
        queue: &str,
        job: &crate::job::Job,
        claim_key: &[u8],
        claim_timeout_ms: u64,
    ) -> bool {
        let queue_workers: Vec<String> = self
            .workers
            .iter()
            .filter(|(_, w)| w.queue == queue)
            .map(|(id, _)| id.clone())
            .collect();

        if queue_workers.is_empty() {
            return false;
        }

        let rr_idx = self.worker_rr_idx.entry(queue.to_string()).or_insert(0);
        let mut attempts = 0;

        while attempts < queue_workers.len() {
            let worker_id = &queue_workers[*rr_idx % queue_workers.len()];
            *rr_idx = rr_idx.wrapping_add(1);
            attempts += 1;

            let expiry_ns = deadline_ns(now_ns(), Duration::from_millis(claim_timeout_ms));
            let claim_val = crate::storage::keys::claim_value(worker_id, expiry_ns);
            let expiry_key = crate::storage::keys::claim_expiry_key(expiry_ns, queue, &job.id);

            if let Err(e) = self.storage.write_batch(vec![
                WriteBatchOp::PutClaim {
                    key: claim_key.to_vec(),
                    value: claim_val,
                },
                WriteBatchOp::PutClaimExpiry {
                    key: expiry_key.clone(),
                },
            ]) {
                error!(job_id = %job.id, error = %e, "failed to write claim");
                return false;
            }

            let claimed = ClaimedJob {
                id: job.id,
                queue: job.queue.clone(),
                job_type: job.job_type.clone(),
                payload: job.payload.clone(),
                attempts_made: job.attempts_made,
                max_attempts: job.max_attempts,
            };

            let Some(entry) = self.workers.get(worker_id) else {
                continue;
            };

            match entry.tx.try_send(claimed) {
                Ok(()) => return true,
                Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                    warn!(%worker_id, job_id = %job.id, "worker channel full, trying next");
                    if let Err(e) = self.storage.write_batch(vec![
                        WriteBatchOp::DeleteClaim {
                            key: claim_key.to_vec(),
                        },
                        WriteBatchOp::DeleteClaimExpiry { key: expiry_key },
                    ]) {
                        error!(%worker_id, job_id = %job.id, error = %e, "failed to roll back claim");
                    }
                }
                Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                    warn!(%worker_id, job_id = %job.id, "worker channel closed, trying next");
                    if let Err(e) = self.storage.write_batch(vec![
                        WriteBatchOp::DeleteClaim {
                            key: claim_key.to_vec(),
                        },
                        WriteBatchOp::DeleteClaimExpiry { key: expiry_key },
                    ]) {
                        error!(%worker_id, job_id = %job.id, error = %e, "failed to roll back claim");
                    }
                }
            }
        }

        false
    }
}
