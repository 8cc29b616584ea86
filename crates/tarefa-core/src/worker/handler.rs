use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::job::FailureInfo;
use crate::service::command::ClaimedJob;

/// Boxed future returned by job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// A typed failure reported by a handler. Both variants consume a retry
/// attempt — an unregistered job type is treated exactly like a failed
/// invocation so it still dead-letters after the attempt budget.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{message}")]
    Failed {
        message: String,
        trace: Option<String>,
    },

    #[error("no handler registered for job type: {0}")]
    UnknownJobType(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            trace: None,
        }
    }

    pub fn failed_with_trace(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            trace: Some(trace.into()),
        }
    }

    /// Convert into the diagnostics carried on the job and the dead-letter
    /// record.
    pub fn failure_info(&self) -> FailureInfo {
        match self {
            Self::Failed { message, trace } => FailureInfo {
                message: message.clone(),
                trace: trace.clone(),
            },
            Self::UnknownJobType(_) => FailureInfo::new(self.to_string()),
        }
    }
}

/// An async job handler. Implemented for any `Fn(ClaimedJob) -> HandlerFuture`
/// closure, so registration reads naturally:
///
/// ```ignore
/// registry.register("send-email", |job| {
///     Box::pin(async move { send(job.payload).await })
/// });
/// ```
pub trait Handler: Send + Sync {
    fn handle(&self, job: ClaimedJob) -> HandlerFuture;
}

impl<F> Handler for F
where
    F: Fn(ClaimedJob) -> HandlerFuture + Send + Sync,
{
    fn handle(&self, job: ClaimedJob) -> HandlerFuture {
        (self)(job)
    }
}

/// Dispatch table mapping job types to handlers for one worker pool.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a job type. Replaces any existing handler for
    /// the same type.
    pub fn register(&mut self, job_type: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers.insert(job_type.into(), Arc::new(handler));
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Run the registered handler for the job's type. An unknown type
    /// resolves to `HandlerError::UnknownJobType`.
    pub fn dispatch(&self, job: ClaimedJob) -> HandlerFuture {
        match self.handlers.get(&job.job_type) {
            Some(handler) => handler.handle(job),
            None => Box::pin(async move { Err(HandlerError::UnknownJobType(job.job_type)) }),
        }
    }
}
