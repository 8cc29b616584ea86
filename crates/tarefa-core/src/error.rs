/// Low-level storage errors (RocksDB, serialization).
/// This is the error type for the `Storage` trait — storage operations can only
/// fail with infrastructure errors, never domain errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("rocksdb error: {0}")]
    RocksDb(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt data: {0}")]
    CorruptData(String),
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        StorageError::RocksDb(err.into_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors crossing the command channel between callers and the scheduler
/// thread. Analogous to transport errors — every per-operation type embeds
/// this via `#[from]`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("scheduler command channel is full")]
    ChannelFull,

    #[error("scheduler command channel is disconnected")]
    ChannelDisconnected,

    #[error("scheduler dropped the reply channel")]
    ReplyDropped,
}

// --- Per-operation error types ---

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("queue store unavailable: {0}")]
    QueueUnavailable(#[from] StorageError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, thiserror::Error)]
pub enum AckError {
    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("queue store unavailable: {0}")]
    QueueUnavailable(#[from] StorageError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl AckError {
    /// Whether a later attempt at the same ack could succeed. A congested
    /// command channel or a storage fault may clear; an unknown job or a
    /// dead scheduler will not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::QueueUnavailable(_) | Self::Dispatch(DispatchError::ChannelFull)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FailError {
    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("queue store unavailable: {0}")]
    QueueUnavailable(#[from] StorageError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl FailError {
    /// Same classification as [`AckError::is_transient`].
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::QueueUnavailable(_) | Self::Dispatch(DispatchError::ChannelFull)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CreateQueueError {
    #[error("queue already exists: {0}")]
    QueueAlreadyExists(String),

    #[error("invalid queue configuration: {0}")]
    InvalidConfig(String),

    #[error("queue store unavailable: {0}")]
    QueueUnavailable(#[from] StorageError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteQueueError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("queue store unavailable: {0}")]
    QueueUnavailable(#[from] StorageError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("queue store unavailable: {0}")]
    QueueUnavailable(#[from] StorageError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, thiserror::Error)]
pub enum DeadLetterError {
    #[error("dead-letter store unavailable: {0}")]
    SinkUnavailable(#[from] StorageError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Errors from the service lifecycle itself (spawn/join of the scheduler thread).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to spawn scheduler thread: {0}")]
    SchedulerSpawn(String),

    #[error("scheduler thread panicked")]
    SchedulerPanicked,
}
