//! Background task that runs the scanner at a randomized interval.
//!
//! Processes never talk to each other. Each one sleeps a random amount whose
//! mean is the cluster-wide poll interval multiplied by the number of live
//! processes, so the cluster as a whole scans roughly once per interval no
//! matter how many processes there are.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{OnceCell, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::{
    DelayStore, DueJobScanner, Enqueuer, ErrorHandler, JobPublisher, LogErrorHandler, PollState,
    ProcessRegistry, SchedulerConfig, SchedulerError, Wake, now_score,
};

/// Below this many processes the sampled interval is kept near the mean.
pub const SMALL_CLUSTER: usize = 10;

/// Periodically drains delay sets from a single background task.
pub struct Poller {
    inner: Arc<Inner>,
    task: Mutex<Option<Task>>,
}

/// Handle to the running background task.
struct Task {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner {
    config: SchedulerConfig,
    scanner: Arc<dyn DueJobScanner>,
    registry: Arc<dyn ProcessRegistry>,
    error_handler: RwLock<Arc<dyn ErrorHandler>>,
    average: OnceCell<f64>,
}

impl Poller {
    /// Create a poller using the default [`Enqueuer`] scanner.
    ///
    /// Fails if `config` does not pass [`SchedulerConfig::validate`].
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn DelayStore>,
        publisher: Arc<dyn JobPublisher>,
        registry: Arc<dyn ProcessRegistry>,
    ) -> Result<Self, SchedulerError> {
        Self::with_scanner(config, Arc::new(Enqueuer::new(store, publisher)), registry)
    }

    /// Create a poller driving a custom scanner.
    pub fn with_scanner(
        config: SchedulerConfig,
        scanner: Arc<dyn DueJobScanner>,
        registry: Arc<dyn ProcessRegistry>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                scanner,
                registry,
                error_handler: RwLock::new(Arc::new(LogErrorHandler)),
                average: OnceCell::new(),
            }),
            task: Mutex::new(None),
        })
    }

    /// Route loop failures to `handler` instead of only logging them.
    pub fn with_error_handler(self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.set_error_handler(handler);
        self
    }

    /// Replace the error handler. A running task picks it up on its next
    /// failure.
    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        *self
            .inner
            .error_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = handler;
    }

    /// Spawn the background task. Does nothing if it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("scheduler already running");
            return;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run(shutdown_rx).await });
        *task = Some(Task { shutdown, handle });
    }

    /// Stop the background task and wait for it to exit.
    ///
    /// A sleeping task wakes immediately; a scan in progress is allowed to
    /// finish. No scan starts after this returns. Calling it on a stopped
    /// poller does nothing.
    pub async fn terminate(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Task { shutdown, handle }) = task else {
            return;
        };

        // The receiver is gone if the task already exited.
        let _ = shutdown.send(true);
        if let Err(e) = handle.await {
            warn!(error = %e, "scheduler task panicked");
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PollState {
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        match task.as_ref() {
            Some(t) if !t.handle.is_finished() => PollState::Running,
            _ => PollState::Stopped,
        }
    }

    /// Run one scan now, reporting any failure instead of returning it.
    pub async fn enqueue(&self) {
        self.inner.enqueue().await;
    }

    /// Mean seconds between scans for this process.
    pub async fn poll_interval_average(&self) -> Result<f64, SchedulerError> {
        self.inner.poll_interval_average().await
    }

    /// Draw the next sleep, in seconds.
    pub async fn random_poll_interval(&self) -> Result<f64, SchedulerError> {
        self.inner.random_poll_interval().await
    }
}

impl Inner {
    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler starting");

        if self.initial_wait(&mut shutdown).await == Wake::Elapsed {
            while !*shutdown.borrow() {
                self.enqueue().await;
                if self.wait(&mut shutdown).await == Wake::Shutdown {
                    break;
                }
            }
        }

        info!("scheduler exiting");
    }

    async fn enqueue(&self) {
        if let Err(e) = self
            .scanner
            .enqueue_jobs(now_score(), &self.config.sets)
            .await
        {
            // Usually the store being unreachable; the next cycle retries.
            error!(error = %e, "failed to enqueue due jobs");
            self.report(&e, "enqueue");
        }
    }

    async fn wait(&self, shutdown: &mut watch::Receiver<bool>) -> Wake {
        match self.random_poll_interval().await {
            Ok(secs) => {
                debug!(secs, "sleeping until next scan");
                sleep_or_shutdown(shutdown, seconds(secs)).await
            }
            Err(e) => {
                error!(error = %e, "failed to compute poll interval");
                self.report(&e, "wait");
                sleep_or_shutdown(shutdown, self.config.wait_error_delay).await
            }
        }
    }

    fn report(&self, error: &SchedulerError, context: &str) {
        let handler = self
            .error_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        handler.handle(error, context);
    }

    /// Give the process registry time to settle and stagger startup.
    async fn initial_wait(&self, shutdown: &mut watch::Receiver<bool>) -> Wake {
        let mut total = Duration::ZERO;
        if self.config.poll_interval_average.is_none() {
            total += self.config.initial_wait;
        }
        let jitter: f64 = rand::thread_rng().r#gen();
        total += self.config.initial_wait_jitter.mul_f64(jitter);

        debug!(secs = total.as_secs_f64(), "initial wait");
        sleep_or_shutdown(shutdown, total).await
    }

    async fn random_poll_interval(&self) -> Result<f64, SchedulerError> {
        let avg = self.poll_interval_average().await?;
        let count = self.process_count().await?;
        Ok(sample_poll_interval(avg, count, &mut rand::thread_rng()))
    }

    async fn poll_interval_average(&self) -> Result<f64, SchedulerError> {
        if let Some(avg) = self.config.poll_interval_average {
            return Ok(avg);
        }

        self.average
            .get_or_try_init(|| async {
                let count = self.process_count().await?;
                let avg = scaled_poll_interval(count, self.config.average_scheduled_poll_interval);
                info!(processes = count, avg, "computed poll interval average");
                Ok::<f64, SchedulerError>(avg)
            })
            .await
            .copied()
    }

    async fn process_count(&self) -> Result<usize, SchedulerError> {
        Ok(self.registry.live_process_count().await?.max(1))
    }
}

/// Sleep for `duration` unless shutdown is requested first.
pub async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> Wake {
    if *shutdown.borrow() {
        return Wake::Shutdown;
    }

    let timer = sleep(duration);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            _ = &mut timer => return Wake::Elapsed,
            changed = shutdown.changed() => {
                // A dropped sender means the poller itself is gone.
                if changed.is_err() || *shutdown.borrow() {
                    return Wake::Shutdown;
                }
            }
        }
    }
}

/// Mean seconds between scans for one process in a cluster of `process_count`.
pub fn scaled_poll_interval(process_count: usize, average_scheduled_poll_interval: f64) -> f64 {
    process_count.max(1) as f64 * average_scheduled_poll_interval
}

/// Sample a sleep in seconds around the mean `avg`.
///
/// Small clusters draw from `[avg / 2, avg * 1.5)`: with only a few
/// processes a run of short or long draws would drift far from the target
/// rate. Larger clusters draw from `[0, avg)`.
pub fn sample_poll_interval<R: Rng + ?Sized>(avg: f64, process_count: usize, rng: &mut R) -> f64 {
    let u: f64 = rng.r#gen();
    if process_count < SMALL_CLUSTER {
        avg * u + avg / 2.0
    } else {
        avg * u
    }
}

/// Sleep length for `secs`, treating negative or NaN values as no sleep.
fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}
