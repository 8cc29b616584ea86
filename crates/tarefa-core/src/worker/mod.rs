//! Worker pools: per-queue handler execution with bounded concurrency.

pub mod handler;
pub mod pool;

pub use handler::{Handler, HandlerError, HandlerFuture, HandlerRegistry};
pub use pool::{PoolEvent, WorkerPool, WorkerPoolConfig};
