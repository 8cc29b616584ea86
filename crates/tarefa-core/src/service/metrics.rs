use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::KeyValue;

/// Core OTel metrics for the job service. Created once during scheduler init
/// and used to record counters/gauges on each operation.
pub struct Metrics {
    pub jobs_enqueued: Counter<u64>,
    pub jobs_claimed: Counter<u64>,
    pub jobs_completed: Counter<u64>,
    pub jobs_failed: Counter<u64>,
    pub jobs_retried: Counter<u64>,
    pub jobs_dead_lettered: Counter<u64>,
    pub claims_stalled: Counter<u64>,
    pub queue_waiting: Gauge<u64>,
    pub claims_active: Gauge<u64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create metrics from the global meter provider. If no meter provider
    /// is configured (OTel disabled), the instruments are no-op.
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("tarefa");
        Self::from_meter(&meter)
    }

    /// Create metrics from a specific meter (used in tests with in-memory exporter).
    pub fn from_meter(meter: &Meter) -> Self {
        Self {
            jobs_enqueued: meter
                .u64_counter("tarefa.jobs.enqueued")
                .with_description("Total jobs enqueued")
                .build(),
            jobs_claimed: meter
                .u64_counter("tarefa.jobs.claimed")
                .with_description("Total jobs claimed by workers")
                .build(),
            jobs_completed: meter
                .u64_counter("tarefa.jobs.completed")
                .with_description("Total jobs acknowledged as completed")
                .build(),
            jobs_failed: meter
                .u64_counter("tarefa.jobs.failed")
                .with_description("Total failed attempts reported by workers")
                .build(),
            jobs_retried: meter
                .u64_counter("tarefa.jobs.retried")
                .with_description("Total jobs rescheduled for another attempt")
                .build(),
            jobs_dead_lettered: meter
                .u64_counter("tarefa.jobs.dead_lettered")
                .with_description("Total jobs moved to the dead-letter sink")
                .build(),
            claims_stalled: meter
                .u64_counter("tarefa.claims.stalled")
                .with_description("Total expired claims reclaimed as stalls")
                .build(),
            queue_waiting: meter
                .u64_gauge("tarefa.queue.waiting")
                .with_description("Current jobs waiting for delivery")
                .build(),
            claims_active: meter
                .u64_gauge("tarefa.claims.active")
                .with_description("Current claimed (in-flight) jobs")
                .build(),
        }
    }

    pub fn record_enqueue(&self, queue: &str) {
        self.jobs_enqueued
            .add(1, &[KeyValue::new("queue", queue.to_string())]);
    }

    pub fn record_claim(&self, queue: &str) {
        self.jobs_claimed
            .add(1, &[KeyValue::new("queue", queue.to_string())]);
    }

    pub fn record_complete(&self, queue: &str) {
        self.jobs_completed
            .add(1, &[KeyValue::new("queue", queue.to_string())]);
    }

    pub fn record_fail(&self, queue: &str) {
        self.jobs_failed
            .add(1, &[KeyValue::new("queue", queue.to_string())]);
    }

    pub fn record_retry(&self, queue: &str) {
        self.jobs_retried
            .add(1, &[KeyValue::new("queue", queue.to_string())]);
    }

    pub fn record_dead_letter(&self, queue: &str) {
        self.jobs_dead_lettered
            .add(1, &[KeyValue::new("queue", queue.to_string())]);
    }

    pub fn record_stall(&self, queue: &str) {
        self.claims_stalled
            .add(1, &[KeyValue::new("queue", queue.to_string())]);
    }

    pub fn set_queue_waiting(&self, queue: &str, count: u64) {
        self.queue_waiting
            .record(count, &[KeyValue::new("queue", queue.to_string())]);
    }

    pub fn set_claims_active(&self, queue: &str, count: u64) {
        self.claims_active
            .record(count, &[KeyValue::new("queue", queue.to_string())]);
    }
}
