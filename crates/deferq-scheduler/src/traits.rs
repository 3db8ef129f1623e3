//! Collaborators the scheduler talks to.
//!
//! The scheduler owns none of the shared state. Delay sets live in a
//! [`DelayStore`], due jobs go to a [`JobPublisher`], cluster size comes from a
//! [`ProcessRegistry`] and loop failures end up in an [`ErrorHandler`].

use async_trait::async_trait;
use tracing::error;

use crate::{Job, SchedulerError};

/// Score-ordered collections of serialized job payloads.
#[async_trait]
pub trait DelayStore: Send + Sync {
    /// Up to `limit` members of `set` with score <= `max_score`, lowest score
    /// first, skipping the first `offset` matches.
    async fn range_by_score(
        &self,
        set: &str,
        max_score: f64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, SchedulerError>;

    /// Remove `member` from `set`.
    ///
    /// Returns `true` only for the caller that actually removed it; concurrent
    /// callers racing on the same member see `false`.
    async fn remove(&self, set: &str, member: &str) -> Result<bool, SchedulerError>;

    /// Number of members of `set` with score <= `max_score`.
    async fn count_by_score(&self, set: &str, max_score: f64) -> Result<usize, SchedulerError>;
}

/// Pushes jobs onto the work queues consumed by workers.
#[async_trait]
pub trait JobPublisher: Send + Sync {
    async fn publish(&self, job: Job) -> Result<(), SchedulerError>;
}

/// Source of the live dispatcher process count.
#[async_trait]
pub trait ProcessRegistry: Send + Sync {
    async fn live_process_count(&self) -> Result<usize, SchedulerError>;
}

/// Receives failures caught at the poll loop boundary.
pub trait ErrorHandler: Send + Sync {
    /// `context` names the loop step that failed (`"enqueue"`, `"wait"`).
    fn handle(&self, error: &SchedulerError, context: &str);
}

/// Error handler that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn handle(&self, err: &SchedulerError, context: &str) {
        error!(error = %err, context, "scheduler error");
    }
}
