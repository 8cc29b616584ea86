use super::*;

use crate::service::stats::{DeadLetterStats, QueueStats, StatsSnapshot, UnavailableQueue};

impl Scheduler {
    pub(super) fn handle_queue_stats(
        &self,
        queue: &str,
    ) -> Result<QueueStats, crate::error::StatsError> {
        if !self.queues.contains_key(queue) {
            return Err(crate::error::StatsError::QueueNotFound(queue.to_string()));
        }

        // Waiting jobs come from the in-memory pending index
        let waiting = self.pending.get(queue).map(|q| q.len() as u64).unwrap_or(0);

        // Claimed (in-flight) jobs for this queue
        let prefix = crate::storage::keys::job_prefix(queue);
        let active = self
            .claimed_job_keys
            .values()
            .filter(|key| key.starts_with(&prefix))
            .count() as u64;

        // Delayed entries are keyed by deadline, not queue, so filter by value
        let delayed = self
            .storage
            .list_delayed()?
            .iter()
            .filter(|(_, job)| job.queue == queue)
            .count() as u64;

        let completed = self
            .storage
            .list_completed(&crate::storage::keys::completed_prefix(queue))?
            .len() as u64;

        let failed = self
            .storage
            .list_dead_letters(&crate::storage::keys::dead_letter_prefix(queue))?
            .len() as u64;

        debug!(%queue, waiting, active, delayed, completed, failed, "get stats");

        Ok(QueueStats {
            name: queue.to_string(),
            waiting,
            active,
            delayed,
            completed,
            failed,
        })
    }

    /// Aggregate snapshot across all queues. A store error while computing
    /// one queue's counts degrades that entry into `unavailable` instead of
    /// failing the whole call.
    pub(super) fn handle_all_stats(&self) -> Result<StatsSnapshot, crate::error::StatsError> {
        let configs = self.storage.list_queues()?;

        let mut queues = Vec::with_capacity(configs.len());
        let mut unavailable = Vec::new();
        for config in &configs {
            match self.handle_queue_stats(&config.name) {
                Ok(stats) => queues.push(stats),
                Err(e) => {
                    warn!(queue = %config.name, error = %e, "queue stats unavailable");
                    unavailable.push(UnavailableQueue {
                        name: config.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let dead_letter = match self.storage.list_all_dead_letters() {
            Ok(records) => DeadLetterStats {
                total: records.len() as u64,
            },
            Err(e) => {
                warn!(error = %e, "dead-letter stats unavailable");
                unavailable.push(UnavailableQueue {
                    name: "(dead-letter sink)".to_string(),
                    reason: e.to_string(),
                });
                DeadLetterStats::default()
            }
        };

        Ok(StatsSnapshot {
            queues,
            dead_letter,
            unavailable,
            retrieved_at: now_ns(),
        })
    }

    pub(super) fn handle_list_dead_letters(
        &self,
        queue: Option<&str>,
    ) -> Result<Vec<crate::dead_letter::DeadLetterRecord>, crate::error::DeadLetterError> {
        let records = match queue {
            Some(queue) => self
                .storage
                .list_dead_letters(&crate::storage::keys::dead_letter_prefix(queue))?,
            None => self.storage.list_all_dead_letters()?,
        };
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }

    /// Explicit operator purge. This is the only way dead letters leave the
    /// sink — nothing prunes them automatically.
    pub(super) fn handle_purge_dead_letters(
        &mut self,
        queue: Option<&str>,
    ) -> Result<u64, crate::error::DeadLetterError> {
        let records = match queue {
            Some(queue) => self
                .storage
                .list_dead_letters(&crate::storage::keys::dead_letter_prefix(queue))?,
            None => self.storage.list_all_dead_letters()?,
        };

        let purged = records.len() as u64;
        let ops: Vec<WriteBatchOp> = records
            .into_iter()
            .map(|(key, _)| WriteBatchOp::DeleteDeadLetter { key })
            .collect();
        self.storage.write_batch(ops)?;

        info!(queue = queue.unwrap_or("*"), purged, "purged dead letters");
        Ok(purged)
    }
}
