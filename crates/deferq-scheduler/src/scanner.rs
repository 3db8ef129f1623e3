//! Moves due entries out of delay sets and onto work queues.
//!
//! Any number of scanners may drain the same set at once. Nothing is
//! reserved up front: every scanner reads the lowest-scored entries and the
//! store's conditional remove decides who gets to publish each one. When a
//! batch is mostly lost to other scanners, the next batch starts from a
//! random offset so the scanners spread out over the set.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info};

use crate::{DelayStore, Job, JobPublisher, SchedulerError};

/// Entries fetched per range query.
pub const BATCH_SIZE: usize = 100;

/// Lost removals in one batch above which the scan offset is moved.
pub const CONFLICT_THRESHOLD: usize = 70;

/// Due-count below which a contended scan restarts from the head of the set.
pub const RESCAN_QUEUE_LENGTH: usize = 1_000;

/// Upper bound for a randomized scan offset.
pub const MAX_OFFSET: usize = 10_000;

/// Drains due entries from delay sets.
#[async_trait]
pub trait DueJobScanner: Send + Sync {
    /// Publish every entry of `sets` whose score is <= `now`.
    async fn enqueue_jobs(&self, now: f64, sets: &[String]) -> Result<(), SchedulerError>;
}

/// Default scanner, backed by a [`DelayStore`] and a [`JobPublisher`].
pub struct Enqueuer {
    store: Arc<dyn DelayStore>,
    publisher: Arc<dyn JobPublisher>,
}

impl Enqueuer {
    pub fn new(store: Arc<dyn DelayStore>, publisher: Arc<dyn JobPublisher>) -> Self {
        Self { store, publisher }
    }

    async fn drain_set(&self, set: &str, now: f64) -> Result<usize, SchedulerError> {
        let mut offset = 0;
        let mut enqueued = 0;

        loop {
            let batch = self
                .store
                .range_by_score(set, now, offset, BATCH_SIZE)
                .await?;
            if batch.is_empty() {
                break;
            }

            let mut conflicts = 0;
            for payload in &batch {
                // Losing the remove means another scanner owns this entry.
                if !self.store.remove(set, payload).await? {
                    conflicts += 1;
                    continue;
                }

                let job = Job::from_payload(payload)?;
                self.publisher.publish(job).await?;
                enqueued += 1;
                debug!(set, payload = %payload, "enqueued");
            }

            if conflicts > CONFLICT_THRESHOLD {
                let queue_length = self.store.count_by_score(set, now).await?;
                offset = contended_offset(queue_length, &mut rand::thread_rng());
                info!(set, conflicts, queue_length, offset, "scan contended, moving offset");
            }
        }

        Ok(enqueued)
    }
}

#[async_trait]
impl DueJobScanner for Enqueuer {
    #[tracing::instrument(skip(self, sets), fields(sets = ?sets))]
    async fn enqueue_jobs(&self, now: f64, sets: &[String]) -> Result<(), SchedulerError> {
        for set in sets {
            let enqueued = self.drain_set(set, now).await?;
            if enqueued > 0 {
                debug!(set = %set, enqueued, "drained delay set");
            }
        }
        Ok(())
    }
}

/// Offset for the next batch after a contended one.
///
/// Short sets are rescanned from the head. Long sets get a uniform offset in
/// `[0, min(queue_length / 2, MAX_OFFSET)]`.
pub fn contended_offset<R: Rng + ?Sized>(queue_length: usize, rng: &mut R) -> usize {
    if queue_length < RESCAN_QUEUE_LENGTH {
        return 0;
    }
    let max_offset = (queue_length / 2).min(MAX_OFFSET);
    rng.gen_range(0..=max_offset)
}
