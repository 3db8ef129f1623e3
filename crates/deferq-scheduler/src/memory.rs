//! In-process implementations of the scheduler collaborators.
//!
//! Useful for tests and single-process setups. Every operation takes the
//! store's lock, so conditional removal is exclusive the same way a shared
//! store's compare-and-delete is.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{DelayStore, Job, JobPublisher, ProcessRegistry, SchedulerError};

/// Delay sets held in memory, each kept sorted by `(score, member)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sets: Mutex<HashMap<String, Vec<(f64, String)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `member` to `set` at `score`.
    ///
    /// An identical member already in the set only has its score replaced.
    pub async fn add(&self, set: &str, score: f64, member: impl Into<String>) {
        let member = member.into();
        let mut sets = self.sets.lock().await;
        let entries = sets.entry(set.to_string()).or_default();

        entries.retain(|(_, m)| *m != member);
        let pos = entries.partition_point(|(s, m)| (*s, m.as_str()) < (score, member.as_str()));
        entries.insert(pos, (score, member));
    }

    /// Number of members in `set`.
    pub async fn len(&self, set: &str) -> usize {
        self.sets.lock().await.get(set).map_or(0, Vec::len)
    }

    /// Members of `set` in score order.
    pub async fn members(&self, set: &str) -> Vec<String> {
        self.sets
            .lock()
            .await
            .get(set)
            .map(|entries| entries.iter().map(|(_, m)| m.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DelayStore for MemoryStore {
    async fn range_by_score(
        &self,
        set: &str,
        max_score: f64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, SchedulerError> {
        let sets = self.sets.lock().await;
        Ok(sets
            .get(set)
            .map(|entries| {
                entries
                    .iter()
                    .take_while(|(score, _)| *score <= max_score)
                    .skip(offset)
                    .take(limit)
                    .map(|(_, m)| m.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn remove(&self, set: &str, member: &str) -> Result<bool, SchedulerError> {
        let mut sets = self.sets.lock().await;
        let Some(entries) = sets.get_mut(set) else {
            return Ok(false);
        };

        match entries.iter().position(|(_, m)| m == member) {
            Some(pos) => {
                entries.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_by_score(&self, set: &str, max_score: f64) -> Result<usize, SchedulerError> {
        let sets = self.sets.lock().await;
        Ok(sets.get(set).map_or(0, |entries| {
            entries.partition_point(|(score, _)| *score <= max_score)
        }))
    }
}

/// Publisher that records every job it receives.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    jobs: Mutex<Vec<Job>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs published so far, oldest first.
    pub async fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().await.clone()
    }
}

#[async_trait]
impl JobPublisher for MemoryPublisher {
    async fn publish(&self, job: Job) -> Result<(), SchedulerError> {
        self.jobs.lock().await.push(job);
        Ok(())
    }
}

/// Registry reporting a constant process count.
#[derive(Debug, Clone, Copy)]
pub struct FixedProcessCount(pub usize);

#[async_trait]
impl ProcessRegistry for FixedProcessCount {
    async fn live_process_count(&self) -> Result<usize, SchedulerError> {
        Ok(self.0)
    }
}
