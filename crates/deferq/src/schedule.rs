//! Schedule command: put a job into a delay set.

use chrono::{Duration, Utc};
use miette::{IntoDiagnostic, Result, miette};
use tracing::info;

use deferq_redis::RedisBackend;
use deferq_scheduler::{Job, score_at};

/// Validate `payload` and add it to `set`, due `delay` seconds from now.
pub async fn run(
    redis_url: &str,
    namespace: Option<String>,
    set: &str,
    delay: f64,
    payload: &str,
) -> Result<()> {
    let job = Job::from_payload(payload).into_diagnostic()?;
    let score = due_score(delay)?;

    let backend = RedisBackend::connect(redis_url, namespace)
        .await
        .into_diagnostic()?;
    backend
        .schedule(set, score, &job.to_payload().into_diagnostic()?)
        .await
        .into_diagnostic()?;

    info!(set, class = %job.class, score, "scheduled job");
    Ok(())
}

fn due_score(delay: f64) -> Result<f64> {
    if !delay.is_finite() {
        return Err(miette!("delay must be a finite number of seconds"));
    }
    let offset = Duration::try_milliseconds((delay * 1000.0) as i64)
        .ok_or_else(|| miette!("delay of {} seconds is out of range", delay))?;
    let at = Utc::now()
        .checked_add_signed(offset)
        .ok_or_else(|| miette!("delay of {} seconds is out of range", delay))?;
    Ok(score_at(at))
}
