//! Delayed-job dispatch for deferq.
//!
//! This crate moves jobs whose scheduled time has passed out of the
//! score-ordered delay sets and onto work queues:
//! - Any number of processes can scan the same sets without locks
//! - Conditional removal decides which scanner publishes an entry
//! - Each process polls at a random interval scaled by cluster size
//! - Shutdown interrupts the poll loop immediately

mod config;
mod error;
pub mod memory;
mod poller;
mod scanner;
mod traits;
mod types;

pub use config::{
    DEFAULT_AVERAGE_POLL_INTERVAL, INITIAL_WAIT, INITIAL_WAIT_JITTER, SchedulerConfig,
    WAIT_ERROR_DELAY,
};
pub use error::SchedulerError;
pub use poller::{
    Poller, SMALL_CLUSTER, sample_poll_interval, scaled_poll_interval, sleep_or_shutdown,
};
pub use scanner::{
    BATCH_SIZE, CONFLICT_THRESHOLD, DueJobScanner, Enqueuer, MAX_OFFSET, RESCAN_QUEUE_LENGTH,
    contended_offset,
};
pub use traits::{DelayStore, ErrorHandler, JobPublisher, LogErrorHandler, ProcessRegistry};
pub use types::{
    DEFAULT_QUEUE, DEFAULT_SETS, Job, PollState, RETRY_SET, SCHEDULE_SET, Wake, now_score,
    score_at,
};
