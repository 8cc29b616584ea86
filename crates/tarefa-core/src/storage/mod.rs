//! Persistence layer: a [`Storage`] trait over key-ordered column families and
//! the RocksDB implementation behind it.

pub(crate) mod keys;
mod rocksdb;
mod traits;

pub use rocksdb::RocksDbStorage;
pub use traits::{CompletedRecord, Storage, WriteBatchOp};
