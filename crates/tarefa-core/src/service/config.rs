use serde::Deserialize;

/// Top-level service configuration, deserializable from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub scheduler: SchedulerConfig,
    pub worker: WorkerDefaults,
}

/// Scheduler configuration (channel capacity, idle timeout).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub command_channel_capacity: usize,
    /// How long the scheduler parks waiting for a command before running
    /// periodic work (delayed-job promotion, stall reclaim, retention).
    pub idle_timeout_ms: u64,
}

/// Defaults applied to worker pools that don't override them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerDefaults {
    pub concurrency: usize,
    pub shutdown_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            command_channel_capacity: 10_000,
            idle_timeout_ms: 100,
        }
    }
}

impl Default for WorkerDefaults {
    fn default() -> Self {
        Self {
            concurrency: 4,
            shutdown_timeout_ms: 30_000,
        }
    }
}
