//! Redis backend for deferq.
//!
//! Implements the scheduler's store, publisher and process registry on a
//! single Redis server: delay sets are sorted sets, work queues are lists.

mod backend;
mod error;

pub use backend::{ENQUEUED_AT_FIELD, PROCESSES_KEY, QUEUES_KEY, RedisBackend};
pub use error::BackendError;
