use super::*;
use crate::job::EnqueueOptions;
use crate::queue::QueueConfig;
use crate::service::config::SchedulerConfig;
use crate::storage::RocksDbStorage;
use uuid::Uuid;

mod common;
use common::*;

mod ack_fail;
mod delivery;
mod recovery;
