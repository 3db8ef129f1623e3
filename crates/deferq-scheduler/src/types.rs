//! Scheduler types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Delay set holding jobs waiting for another attempt.
pub const RETRY_SET: &str = "retry";

/// Delay set holding jobs scheduled for a future time.
pub const SCHEDULE_SET: &str = "schedule";

/// Delay sets scanned by default, in scan order.
pub const DEFAULT_SETS: [&str; 2] = [RETRY_SET, SCHEDULE_SET];

/// Queue a job lands in when its payload names none.
pub const DEFAULT_QUEUE: &str = "default";

/// A job payload taken out of a delay set.
///
/// Only the fields the dispatcher cares about are typed. Everything else the
/// producer wrote is kept in `extra` and written back on publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Work queue the job is pushed onto.
    #[serde(default = "default_queue")]
    pub queue: String,
    /// Worker class that executes the job.
    pub class: String,
    /// Positional arguments for the worker.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Job id assigned by the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jid: Option<String>,
    /// Fields not modelled above (retry counters, timestamps, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

impl Job {
    /// Parse a serialized delay-set entry.
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Serialize back into the payload form stored in delay sets and queues.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Lifecycle state of a [`Poller`](crate::Poller).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollState {
    /// No background task exists.
    #[default]
    Stopped,
    /// The background task is scanning or sleeping.
    Running,
}

/// How an interruptible sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The full duration passed.
    Elapsed,
    /// Shutdown was requested before the duration passed.
    Shutdown,
}

/// Convert a timestamp into a delay-set score (fractional epoch seconds).
pub fn score_at(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

/// The score of the current instant.
pub fn now_score() -> f64 {
    score_at(Utc::now())
}
