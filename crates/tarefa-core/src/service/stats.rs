use serde::Serialize;

/// Point-in-time counts for a single queue. Recomputed on each request,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStats {
    pub name: String,
    /// Jobs available for delivery (not claimed, not delayed).
    pub waiting: u64,
    /// Jobs currently claimed by a worker.
    pub active: u64,
    /// Jobs waiting out a retry or initial delay.
    pub delayed: u64,
    /// Completed records still within the retention window.
    pub completed: u64,
    /// Dead-letter records that originated from this queue.
    pub failed: u64,
}

/// Aggregate counts for the dead-letter sink across all origin queues.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeadLetterStats {
    pub total: u64,
}

/// Aggregate snapshot across all queues.
///
/// A store error while computing one queue's counts degrades that entry
/// into `unavailable` (name plus reason) instead of failing the call.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub queues: Vec<QueueStats>,
    pub dead_letter: DeadLetterStats,
    pub unavailable: Vec<UnavailableQueue>,
    /// Epoch nanoseconds at which the snapshot was taken.
    pub retrieved_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnavailableQueue {
    pub name: String,
    pub reason: String,
}
