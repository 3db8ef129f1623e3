//! Integration tests against a live Redis server.
//!
//! Run with `REDIS_URL=redis://localhost:6379 cargo test -- --ignored`.
//! Every test works under a random namespace so runs do not interfere.

use std::sync::Arc;

use serde_json::{Value, json};

use deferq_redis::RedisBackend;
use deferq_scheduler::{
    DelayStore, DueJobScanner, Enqueuer, ProcessRegistry, SCHEDULE_SET, now_score,
};

async fn backend() -> RedisBackend {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let namespace = format!("deferq-test-{}", rand::random::<u32>());
    RedisBackend::connect(&url, Some(namespace))
        .await
        .expect("REDIS_URL must point at a running Redis server")
}

fn job(jid: &str) -> String {
    json!({ "class": "HardWorker", "queue": "default", "args": [], "jid": jid }).to_string()
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn store_operations_follow_score_order() {
    let redis = backend().await;
    redis.schedule(SCHEDULE_SET, 30.0, "c").await.unwrap();
    redis.schedule(SCHEDULE_SET, 10.0, "a").await.unwrap();
    redis.schedule(SCHEDULE_SET, 20.0, "b").await.unwrap();

    let due = redis.range_by_score(SCHEDULE_SET, 25.0, 0, 100).await.unwrap();
    assert_eq!(due, vec!["a", "b"]);
    assert_eq!(redis.count_by_score(SCHEDULE_SET, 25.0).await.unwrap(), 2);

    assert!(redis.remove(SCHEDULE_SET, "a").await.unwrap());
    assert!(!redis.remove(SCHEDULE_SET, "a").await.unwrap());
    assert_eq!(redis.count_by_score(SCHEDULE_SET, 100.0).await.unwrap(), 2);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn scanner_moves_due_jobs_onto_queue() {
    let redis = Arc::new(backend().await);
    let now = now_score();
    redis.schedule(SCHEDULE_SET, now - 10.0, &job("a")).await.unwrap();
    redis.schedule(SCHEDULE_SET, now - 5.0, &job("b")).await.unwrap();
    redis.schedule(SCHEDULE_SET, now + 100.0, &job("c")).await.unwrap();

    Enqueuer::new(redis.clone(), redis.clone())
        .enqueue_jobs(now, &[SCHEDULE_SET.to_string()])
        .await
        .unwrap();

    let queued = redis.queued("default").await.unwrap();
    let mut jids: Vec<String> = queued
        .iter()
        .map(|p| serde_json::from_str::<Value>(p).unwrap())
        .map(|v| {
            assert!(v["enqueued_at"].is_f64());
            v["jid"].as_str().unwrap().to_string()
        })
        .collect();
    jids.sort();
    assert_eq!(jids, vec!["a", "b"]);
    assert_eq!(redis.count_by_score(SCHEDULE_SET, f64::MAX).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn empty_registry_reports_zero() {
    let redis = backend().await;
    assert_eq!(redis.live_process_count().await.unwrap(), 0);
}
