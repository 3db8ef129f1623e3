//! Scheduler configuration.

use std::time::Duration;

use crate::{DEFAULT_SETS, SchedulerError};

/// Default per-process poll interval in seconds.
pub const DEFAULT_AVERAGE_POLL_INTERVAL: f64 = 5.0;

/// Settle time before the first scan, giving the process registry a chance
/// to see every process that is starting up.
pub const INITIAL_WAIT: Duration = Duration::from_secs(10);

/// Upper bound of the random jitter added to the initial wait.
pub const INITIAL_WAIT_JITTER: Duration = Duration::from_secs(5);

/// Pause after a failed wait before the loop carries on.
pub const WAIT_ERROR_DELAY: Duration = Duration::from_secs(5);

/// Configuration for a [`Poller`](crate::Poller).
///
/// Built once and handed to the poller; nothing reads settings from globals.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed mean seconds between scans. Disables cluster-size scaling.
    pub poll_interval_average: Option<f64>,
    /// Desired seconds between scans across the whole cluster. Multiplied by
    /// the live process count to get each process's mean interval.
    pub average_scheduled_poll_interval: f64,
    /// Delay sets to drain, in scan order.
    pub sets: Vec<String>,
    /// Settle time before the first scan (skipped when
    /// `poll_interval_average` is set).
    pub initial_wait: Duration,
    /// Upper bound of the random jitter added to the initial wait.
    pub initial_wait_jitter: Duration,
    /// Pause after a failed wait.
    pub wait_error_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_average: None,
            average_scheduled_poll_interval: DEFAULT_AVERAGE_POLL_INTERVAL,
            sets: DEFAULT_SETS.iter().map(|s| s.to_string()).collect(),
            initial_wait: INITIAL_WAIT,
            initial_wait_jitter: INITIAL_WAIT_JITTER,
            wait_error_delay: WAIT_ERROR_DELAY,
        }
    }
}

impl SchedulerConfig {
    /// Use a fixed poll interval average instead of scaling with cluster size.
    pub fn with_poll_interval_average(mut self, seconds: f64) -> Self {
        self.poll_interval_average = Some(seconds);
        self
    }

    /// Set the cluster-wide poll interval used for scaling.
    pub fn with_average_scheduled_poll_interval(mut self, seconds: f64) -> Self {
        self.average_scheduled_poll_interval = seconds;
        self
    }

    /// Replace the delay sets to drain.
    pub fn with_sets<I, S>(mut self, sets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sets = sets.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if let Some(avg) = self.poll_interval_average
            && !(avg.is_finite() && avg > 0.0)
        {
            return Err(SchedulerError::InvalidConfig(format!(
                "poll_interval_average must be a positive number of seconds, got {}",
                avg
            )));
        }

        let base = self.average_scheduled_poll_interval;
        if !(base.is_finite() && base > 0.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "average_scheduled_poll_interval must be a positive number of seconds, got {}",
                base
            )));
        }

        if self.sets.is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "at least one delay set is required".to_string(),
            ));
        }

        if let Some(set) = self.sets.iter().find(|s| s.is_empty()) {
            return Err(SchedulerError::InvalidConfig(format!(
                "delay set names cannot be empty: {:?}",
                set
            )));
        }

        Ok(())
    }
}
