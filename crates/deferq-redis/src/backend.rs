//! Redis implementation of the scheduler collaborators.
//!
//! Key layout (all keys optionally prefixed with `<namespace>:`):
//! - `retry`, `schedule`: sorted sets of job payloads scored by run time
//! - `queues`: set of known work queue names
//! - `queue:<name>`: list of job payloads waiting for a worker
//! - `processes`: set of live process identities

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use deferq_scheduler::{
    DelayStore, Job, JobPublisher, ProcessRegistry, SchedulerError, now_score,
};

use crate::BackendError;

/// Set holding the names of all work queues.
pub const QUEUES_KEY: &str = "queues";

/// Set holding the identities of live processes.
pub const PROCESSES_KEY: &str = "processes";

/// Field stamped onto a job when it is pushed to a work queue.
pub const ENQUEUED_AT_FIELD: &str = "enqueued_at";

/// Delay store, work queue publisher and process registry backed by one
/// Redis server.
///
/// A dropped connection fails the command in flight and is re-established
/// in the background, so later commands succeed once the server is back.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    namespace: Option<String>,
}

impl RedisBackend {
    /// Connect to the Redis server at `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str, namespace: Option<String>) -> Result<Self, BackendError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(namespace = ?namespace, "connected to Redis");
        Ok(Self { conn, namespace })
    }

    /// Full key for `name` under this backend's namespace.
    pub fn key(&self, name: &str) -> String {
        namespaced(self.namespace.as_deref(), name)
    }

    /// Add a serialized job to a delay set, to run at `score`.
    pub async fn schedule(&self, set: &str, score: f64, payload: &str) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("ZADD")
            .arg(self.key(set))
            .arg(score)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Payloads waiting in the work queue `queue`, newest first.
    pub async fn queued(&self, queue: &str) -> Result<Vec<String>, BackendError> {
        let mut conn = self.conn.clone();
        let payloads: Vec<String> = redis::cmd("LRANGE")
            .arg(self.key(&queue_key(queue)))
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(payloads)
    }

    async fn zrangebyscore(
        &self,
        set: &str,
        max_score: f64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, BackendError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(self.key(set))
            .arg("-inf")
            .arg(max_score)
            .arg("LIMIT")
            .arg(offset)
            .arg(limit)
            .query_async(&mut conn)
            .await?;
        Ok(members)
    }

    async fn zrem(&self, set: &str, member: &str) -> Result<bool, BackendError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("ZREM")
            .arg(self.key(set))
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn zcount(&self, set: &str, max_score: f64) -> Result<usize, BackendError> {
        let mut conn = self.conn.clone();
        let count: usize = redis::cmd("ZCOUNT")
            .arg(self.key(set))
            .arg("-inf")
            .arg(max_score)
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn push(&self, job: Job) -> Result<(), BackendError> {
        let (queue, payload) = prepare_push(job, now_score())?;
        let mut conn = self.conn.clone();

        // Register the queue and push in one transaction so workers never
        // see a job on an unknown queue.
        let () = redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(self.key(QUEUES_KEY))
            .arg(&queue)
            .ignore()
            .cmd("LPUSH")
            .arg(self.key(&queue_key(&queue)))
            .arg(&payload)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!(queue = %queue, "pushed job");
        Ok(())
    }

    async fn scard_processes(&self) -> Result<usize, BackendError> {
        let mut conn = self.conn.clone();
        let count: usize = redis::cmd("SCARD")
            .arg(self.key(PROCESSES_KEY))
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl DelayStore for RedisBackend {
    async fn range_by_score(
        &self,
        set: &str,
        max_score: f64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, SchedulerError> {
        self.zrangebyscore(set, max_score, offset, limit)
            .await
            .map_err(BackendError::into_store)
    }

    async fn remove(&self, set: &str, member: &str) -> Result<bool, SchedulerError> {
        self.zrem(set, member).await.map_err(BackendError::into_store)
    }

    async fn count_by_score(&self, set: &str, max_score: f64) -> Result<usize, SchedulerError> {
        self.zcount(set, max_score)
            .await
            .map_err(BackendError::into_store)
    }
}

#[async_trait]
impl JobPublisher for RedisBackend {
    async fn publish(&self, job: Job) -> Result<(), SchedulerError> {
        self.push(job).await.map_err(BackendError::into_publish)
    }
}

#[async_trait]
impl ProcessRegistry for RedisBackend {
    async fn live_process_count(&self) -> Result<usize, SchedulerError> {
        self.scard_processes()
            .await
            .map_err(BackendError::into_registry)
    }
}

fn namespaced(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}:{}", ns, name),
        _ => name.to_string(),
    }
}

fn queue_key(queue: &str) -> String {
    format!("queue:{}", queue)
}

/// Stamp `enqueued_at` and serialize, returning the target queue and payload.
fn prepare_push(mut job: Job, now: f64) -> Result<(String, String), BackendError> {
    job.extra
        .insert(ENQUEUED_AT_FIELD.to_string(), serde_json::json!(now));
    let payload = job.to_payload()?;
    Ok((job.queue, payload))
}
