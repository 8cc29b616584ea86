use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use crate::dead_letter::DeadLetterRecord;
use crate::error::{StorageError, StorageResult};
use crate::job::Job;
use crate::queue::QueueConfig;
use crate::storage::traits::{CompletedRecord, Storage, WriteBatchOp};

const CF_JOBS: &str = "jobs";
const CF_CLAIMS: &str = "claims";
const CF_CLAIM_EXPIRY: &str = "claim_expiry";
const CF_DELAYED: &str = "delayed";
const CF_COMPLETED: &str = "completed";
const CF_DEAD_LETTER: &str = "dead_letter";
const CF_QUEUES: &str = "queues";

/// All column family names (excluding `default` which RocksDB creates automatically).
const COLUMN_FAMILIES: &[&str] = &[
    CF_JOBS,
    CF_CLAIMS,
    CF_CLAIM_EXPIRY,
    CF_DELAYED,
    CF_COMPLETED,
    CF_DEAD_LETTER,
    CF_QUEUES,
];

type DB = DBWithThreadMode<MultiThreaded>;

/// RocksDB-backed storage implementation.
pub struct RocksDbStorage {
    db: DB,
}

impl RocksDbStorage {
    /// Open or create a RocksDB database at the given path with all column families.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> StorageResult<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::RocksDb(format!("column family not found: {name}")))
    }

    fn scan_prefix<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        prefix: &[u8],
    ) -> StorageResult<Vec<(Vec<u8>, T)>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, rocksdb::Direction::Forward));
        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), serde_json::from_slice(&value)?));
        }
        Ok(results)
    }

    fn scan_up_to<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        up_to_key: &[u8],
    ) -> StorageResult<Vec<(Vec<u8>, T)>> {
        let cf = self.cf(cf_name)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);
        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if key.as_ref() > up_to_key {
                break;
            }
            results.push((key.to_vec(), serde_json::from_slice(&value)?));
        }
        Ok(results)
    }
}

impl Storage for RocksDbStorage {
    fn put_job(&self, key: &[u8], job: &Job) -> StorageResult<()> {
        let cf = self.cf(CF_JOBS)?;
        let value = serde_json::to_vec(job)?;
        self.db.put_cf(&cf, key, &value)?;
        Ok(())
    }

    fn get_job(&self, key: &[u8]) -> StorageResult<Option<Job>> {
        let cf = self.cf(CF_JOBS)?;
        match self.db.get_cf(&cf, key)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn delete_job(&self, key: &[u8]) -> StorageResult<()> {
        let cf = self.cf(CF_JOBS)?;
        self.db.delete_cf(&cf, key)?;
        Ok(())
    }

    fn list_jobs(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Job)>> {
        self.scan_prefix(CF_JOBS, prefix)
    }

    fn put_claim(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let cf = self.cf(CF_CLAIMS)?;
        self.db.put_cf(&cf, key, value)?;
        Ok(())
    }

    fn get_claim(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let cf = self.cf(CF_CLAIMS)?;
        Ok(self.db.get_cf(&cf, key)?.map(|v| v.to_vec()))
    }

    fn delete_claim(&self, key: &[u8]) -> StorageResult<()> {
        let cf = self.cf(CF_CLAIMS)?;
        self.db.delete_cf(&cf, key)?;
        Ok(())
    }

    fn list_expired_claims(&self, up_to_key: &[u8]) -> StorageResult<Vec<Vec<u8>>> {
        let cf = self.cf(CF_CLAIM_EXPIRY)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);
        let mut results = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if key.as_ref() > up_to_key {
                break;
            }
            results.push(key.to_vec());
        }
        Ok(results)
    }

    fn list_due_delayed(&self, up_to_key: &[u8]) -> StorageResult<Vec<(Vec<u8>, Job)>> {
        self.scan_up_to(CF_DELAYED, up_to_key)
    }

    fn list_delayed(&self) -> StorageResult<Vec<(Vec<u8>, Job)>> {
        let cf = self.cf(CF_DELAYED)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);
        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item?;
            results.push((key.to_vec(), serde_json::from_slice(&value)?));
        }
        Ok(results)
    }

    fn list_completed(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, CompletedRecord)>> {
        self.scan_prefix(CF_COMPLETED, prefix)
    }

    fn put_dead_letter(&self, key: &[u8], record: &DeadLetterRecord) -> StorageResult<()> {
        let cf = self.cf(CF_DEAD_LETTER)?;
        let value = serde_json::to_vec(record)?;
        self.db.put_cf(&cf, key, &value)?;
        Ok(())
    }

    fn list_dead_letters(
        &self,
        prefix: &[u8],
    ) -> StorageResult<Vec<(Vec<u8>, DeadLetterRecord)>> {
        self.scan_prefix(CF_DEAD_LETTER, prefix)
    }

    fn list_all_dead_letters(&self) -> StorageResult<Vec<(Vec<u8>, DeadLetterRecord)>> {
        let cf = self.cf(CF_DEAD_LETTER)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);
        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item?;
            results.push((key.to_vec(), serde_json::from_slice(&value)?));
        }
        Ok(results)
    }

    fn put_queue(&self, queue: &str, config: &QueueConfig) -> StorageResult<()> {
        let cf = self.cf(CF_QUEUES)?;
        let value = serde_json::to_vec(config)?;
        self.db.put_cf(&cf, queue.as_bytes(), &value)?;
        Ok(())
    }

    fn get_queue(&self, queue: &str) -> StorageResult<Option<QueueConfig>> {
        let cf = self.cf(CF_QUEUES)?;
        match self.db.get_cf(&cf, queue.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn delete_queue(&self, queue: &str) -> StorageResult<()> {
        let cf = self.cf(CF_QUEUES)?;
        self.db.delete_cf(&cf, queue.as_bytes())?;
        Ok(())
    }

    fn list_queues(&self) -> StorageResult<Vec<QueueConfig>> {
        let cf = self.cf(CF_QUEUES)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);
        let mut results = Vec::new();
        for item in iter {
            let (_, value) = item?;
            results.push(serde_json::from_slice(&value)?);
        }
        Ok(results)
    }

    fn write_batch(&self, ops: Vec<WriteBatchOp>) -> StorageResult<()> {
        let mut batch = WriteBatch::default();

        for op in ops {
            match op {
                WriteBatchOp::PutJob { key, value } => {
                    batch.put_cf(&self.cf(CF_JOBS)?, &key, &value);
                }
                WriteBatchOp::DeleteJob { key } => {
                    batch.delete_cf(&self.cf(CF_JOBS)?, &key);
                }
                WriteBatchOp::PutClaim { key, value } => {
                    batch.put_cf(&self.cf(CF_CLAIMS)?, &key, &value);
                }
                WriteBatchOp::DeleteClaim { key } => {
                    batch.delete_cf(&self.cf(CF_CLAIMS)?, &key);
                }
                WriteBatchOp::PutClaimExpiry { key } => {
                    batch.put_cf(&self.cf(CF_CLAIM_EXPIRY)?, &key, b"");
                }
                WriteBatchOp::DeleteClaimExpiry { key } => {
                    batch.delete_cf(&self.cf(CF_CLAIM_EXPIRY)?, &key);
                }
                WriteBatchOp::PutDelayed { key, value } => {
                    batch.put_cf(&self.cf(CF_DELAYED)?, &key, &value);
                }
                WriteBatchOp::DeleteDelayed { key } => {
                    batch.delete_cf(&self.cf(CF_DELAYED)?, &key);
                }
                WriteBatchOp::PutCompleted { key, value } => {
                    batch.put_cf(&self.cf(CF_COMPLETED)?, &key, &value);
                }
                WriteBatchOp::DeleteCompleted { key } => {
                    batch.delete_cf(&self.cf(CF_COMPLETED)?, &key);
                }
                WriteBatchOp::PutDeadLetter { key, value } => {
                    batch.put_cf(&self.cf(CF_DEAD_LETTER)?, &key, &value);
                }
                WriteBatchOp::DeleteDeadLetter { key } => {
                    batch.delete_cf(&self.cf(CF_DEAD_LETTER)?, &key);
                }
                WriteBatchOp::DeleteQueueConfig { queue } => {
                    batch.delete_cf(&self.cf(CF_QUEUES)?, queue.as_bytes());
                }
            }
        }

        self.db.write(batch)?;
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        self.db.flush_wal(true)?;
        Ok(())
    }
}
