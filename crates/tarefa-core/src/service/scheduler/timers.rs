use super::*;

impl Scheduler {
    /// Scan the `delayed` CF for jobs whose visibility deadline has passed
    /// and move them back to the waiting pool. Jobs are never promoted
    /// before their deadline; entries sharing a deadline keep insertion
    /// order (UUIDv7 ids are time-ordered).
    ///
    /// Returns the number of jobs promoted.
    pub(super) fn promote_due_delayed(&mut self) -> u64 {
        let up_to = crate::storage::keys::delayed_upper_bound(now_ns());
        let due = match self.storage.list_due_delayed(&up_to) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "failed to scan due delayed jobs");
                return 0;
            }
        };

        let mut promoted = 0u64;
        for (delayed_key, job) in due {
            let job_id = job.id;
            let queue = job.queue.clone();

            // The queue may have been deleted while this job sat delayed
            if !self.queues.contains_key(&queue) {
                warn!(%queue, %job_id, "dropping delayed job for deleted queue");
                let _ = self
                    .storage
                    .write_batch(vec![WriteBatchOp::DeleteDelayed { key: delayed_key }]);
                continue;
            }

            let job_key = crate::storage::keys::job_key(&queue, job.created_at, &job_id);
            let job_value = match serde_json::to_vec(&job) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, %queue, %job_id, "failed to serialize delayed job");
                    continue;
                }
            };

            if let Err(e) = self.storage.write_batch(vec![
                WriteBatchOp::DeleteDelayed { key: delayed_key },
                WriteBatchOp::PutJob {
                    key: job_key.clone(),
                    value: job_value,
                },
            ]) {
                warn!(error = %e, %queue, %job_id, "failed to promote delayed job");
                continue;
            }

            self.pending_push(&queue, PendingEntry { job_key, job_id });
            debug!(%queue, %job_id, attempts_made = job.attempts_made, "promoted delayed job");
            promoted += 1;
        }

        promoted
    }

    /// Scan the `claim_expiry` CF for expired claims and reclaim them.
    ///
    /// An expired claim is a stall: the worker went silent without reporting
    /// an outcome. No handler result was observed, so the job returns to the
    /// waiting pool without consuming a retry attempt.
    ///
    /// Returns the number of claims reclaimed.
    pub(super) fn reclaim_expired_claims(&mut self) -> u64 {
        let up_to = crate::storage::keys::claim_expiry_upper_bound(now_ns());
        let expired_keys = match self.storage.list_expired_claims(&up_to) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "failed to scan expired claims");
                return 0;
            }
        };

        let mut reclaimed = 0u64;
        for expiry_key in &expired_keys {
            let Some((queue, job_id)) = crate::storage::keys::parse_claim_expiry_key(expiry_key)
            else {
                warn!("corrupt claim_expiry key, skipping");
                continue;
            };

            let claim_key = crate::storage::keys::claim_key(&queue, &job_id);

            // Find the job key from the claimed index (O(1)), falling back to scan
            let job_key = match self
                .claimed_job_keys
                .remove(&job_id)
                .map(|k| Ok(Some(k)))
                .unwrap_or_else(|| self.find_job_key(&queue, &job_id))
            {
                Ok(Some(key)) => key,
                Ok(None) => {
                    // Job not found — orphaned claim entry, just clean up
                    warn!(%queue, %job_id, "orphaned claim_expiry entry, job not found");
                    let _ = self.storage.write_batch(vec![
                        WriteBatchOp::DeleteClaim {
                            key: claim_key.clone(),
                        },
                        WriteBatchOp::DeleteClaimExpiry {
                            key: expiry_key.clone(),
                        },
                    ]);
                    reclaimed += 1;
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, %queue, %job_id, "failed to find job for expired claim");
                    continue;
                }
            };

            // Drop the claim; the job record itself is untouched. Stalls do
            // not consume an attempt — only an observed handler failure does.
            if let Err(e) = self.storage.write_batch(vec![
                WriteBatchOp::DeleteClaim { key: claim_key },
                WriteBatchOp::DeleteClaimExpiry {
                    key: expiry_key.clone(),
                },
            ]) {
                warn!(error = %e, %queue, %job_id, "failed to reclaim expired claim");
                continue;
            }

            self.metrics.record_stall(&queue);
            self.pending_push(&queue, PendingEntry { job_key, job_id });
            info!(%queue, %job_id, "reclaimed stalled claim");
            reclaimed += 1;
        }

        if reclaimed > 0 {
            info!(reclaimed, "reclaimed expired claims");
        }
        reclaimed
    }

    /// Prune completed records beyond each queue's retention limits.
    /// The dead-letter sink is exempt — it is never auto-pruned.
    pub(super) fn prune_completed(&mut self) {
        let now = now_ns();
        for (name, runtime) in &self.queues {
            let retention = runtime.config.completed_retention;
            let prefix = crate::storage::keys::completed_prefix(name);
            let records = match self.storage.list_completed(&prefix) {
                Ok(records) => records,
                Err(e) => {
                    warn!(queue = %name, error = %e, "failed to scan completed records");
                    continue;
                }
            };

            let cutoff = now.saturating_sub(retention.max_age_ms.saturating_mul(1_000_000));
            let excess = records.len().saturating_sub(retention.max_entries);

            // Keys sort oldest-first, so the count excess is taken off the front
            let mut ops = Vec::new();
            for (i, (key, record)) in records.into_iter().enumerate() {
                if i < excess || record.completed_at < cutoff {
                    ops.push(WriteBatchOp::DeleteCompleted { key });
                }
            }

            if ops.is_empty() {
                continue;
            }
            let pruned = ops.len();
            if let Err(e) = self.storage.write_batch(ops) {
                warn!(queue = %name, error = %e, "failed to prune completed records");
            } else {
                debug!(queue = %name, pruned, "pruned completed records");
            }
        }
    }

    /// Recover state after a crash or restart.
    ///
    /// RocksDB persists all data to disk, so queue definitions, jobs, claims,
    /// and delayed entries survive restarts. Recovery does three things:
    /// 1. Reclaim expired claims so stalled jobs re-enter the waiting pool
    /// 2. Rebuild per-queue runtime state (backoff policies, rate limiters)
    /// 3. Rebuild the pending and claimed in-memory indexes from storage
    pub(super) fn recover(&mut self) {
        self.reclaim_expired_claims();

        // Clear in-memory indexes populated by reclaim_expired_claims —
        // the full scan below rebuilds them from scratch, avoiding duplicates.
        self.pending.clear();
        self.claimed_job_keys.clear();

        match self.storage.list_queues() {
            Ok(queues) => {
                let queue_count = queues.len();
                for config in queues {
                    let name = config.name.clone();
                    self.queues
                        .insert(name.clone(), QueueRuntime::from_config(config));

                    let prefix = crate::storage::keys::job_prefix(&name);
                    match self.storage.list_jobs(&prefix) {
                        Ok(jobs) => {
                            for (key, job) in jobs {
                                let claim_key =
                                    crate::storage::keys::claim_key(&name, &job.id);
                                if self.storage.get_claim(&claim_key).ok().flatten().is_some() {
                                    // Job is claimed (in-flight) — track in claimed_job_keys
                                    self.claimed_job_keys.insert(job.id, key);
                                } else {
                                    // Job is waiting (available for delivery)
                                    self.pending_push(
                                        &name,
                                        PendingEntry {
                                            job_key: key,
                                            job_id: job.id,
                                        },
                                    );
                                }
                            }
                        }
                        Err(e) => {
                            warn!(queue = %name, error = %e, "failed to scan jobs during recovery");
                        }
                    }
                }
                info!(queue_count, "recovery: queues and jobs restored");
            }
            Err(e) => warn!(error = %e, "failed to list queues during recovery"),
        }
    }
}
