//! Error types for the scheduler.

use thiserror::Error;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The delay store could not be reached or rejected a command.
    #[error("store error: {0}")]
    Store(String),

    /// The work queue refused a job.
    #[error("publish failed: {0}")]
    Publish(String),

    /// The process registry could not report a cluster size.
    #[error("process registry error: {0}")]
    Registry(String),

    /// A delay-set entry was not a valid job payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid scheduler configuration.
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}
