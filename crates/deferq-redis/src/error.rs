//! Error types for the Redis backend.

use thiserror::Error;

use deferq_scheduler::SchedulerError;

/// Errors that can occur when talking to Redis.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection or command failure.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Job payload could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    pub(crate) fn into_store(self) -> SchedulerError {
        match self {
            Self::Json(e) => SchedulerError::Json(e),
            other => SchedulerError::Store(other.to_string()),
        }
    }

    pub(crate) fn into_publish(self) -> SchedulerError {
        match self {
            Self::Json(e) => SchedulerError::Json(e),
            other => SchedulerError::Publish(other.to_string()),
        }
    }

    pub(crate) fn into_registry(self) -> SchedulerError {
        SchedulerError::Registry(self.to_string())
    }
}
