//! Daemon command: runs the poller against Redis until a shutdown signal.

use std::sync::Arc;

use miette::{IntoDiagnostic, Result};
use tracing::info;

use deferq_redis::RedisBackend;
use deferq_scheduler::{Poller, SchedulerConfig};

/// Configuration for the daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub redis_url: String,
    pub namespace: Option<String>,
    /// Fixed mean seconds between scans.
    pub poll_interval_average: Option<f64>,
    /// Cluster-wide seconds between scans, scaled by process count.
    pub average_poll_interval: f64,
    pub sets: Vec<String>,
}

impl DaemonConfig {
    fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval_average: self.poll_interval_average,
            ..SchedulerConfig::default()
                .with_average_scheduled_poll_interval(self.average_poll_interval)
                .with_sets(self.sets.iter().cloned())
        }
    }
}

/// Run the dispatcher until SIGINT or SIGTERM.
pub async fn run(config: DaemonConfig) -> Result<()> {
    let scheduler_config = config.scheduler_config();
    scheduler_config.validate().into_diagnostic()?;

    info!(sets = ?scheduler_config.sets, "starting deferq daemon");

    let backend = Arc::new(
        RedisBackend::connect(&config.redis_url, config.namespace.clone())
            .await
            .into_diagnostic()?,
    );

    let poller = Poller::new(
        scheduler_config,
        backend.clone(),
        backend.clone(),
        backend,
    )
    .into_diagnostic()?;
    poller.start();

    shutdown_signal().await;
    info!("received shutdown signal");

    poller.terminate().await;
    info!("deferq daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!(error = %e, "failed to install SIGTERM handler"),
        }
    }

    tokio::signal::ctrl_c().await.ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DaemonConfig {
        DaemonConfig {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            namespace: None,
            poll_interval_average: None,
            average_poll_interval: 15.0,
            sets: vec!["retry".to_string(), "schedule".to_string()],
        }
    }

    #[test]
    fn test_scheduler_config_carries_cli_values() {
        let scheduler = config().scheduler_config();
        assert_eq!(scheduler.poll_interval_average, None);
        assert_eq!(scheduler.average_scheduled_poll_interval, 15.0);
        assert_eq!(scheduler.sets, vec!["retry", "schedule"]);
        assert!(scheduler.validate().is_ok());
    }

    #[test]
    fn test_explicit_average_is_kept() {
        let scheduler = DaemonConfig {
            poll_interval_average: Some(2.5),
            ..config()
        }
        .scheduler_config();
        assert_eq!(scheduler.poll_interval_average, Some(2.5));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let scheduler = DaemonConfig {
            average_poll_interval: 0.0,
            ..config()
        }
        .scheduler_config();
        assert!(scheduler.validate().is_err());
    }
}
