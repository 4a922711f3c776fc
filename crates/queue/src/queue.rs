//! Job queue interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_core::{Job, Result};
use std::collections::HashSet;
use std::time::Duration;

/// Scheduler-facing view of a job queue with per-key distributed locks.
///
/// A pending job has been submitted but not yet claimed. A locked key is
/// currently being processed by a worker.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submits a job.
    async fn submit(&self, job: &Job) -> Result<()>;

    /// Keys of pending jobs with the given name.
    async fn pending_keys(&self, job_name: &str) -> Result<HashSet<String>>;

    /// Whether a worker currently holds the lock for `key`.
    async fn is_locked(&self, key: &str) -> Result<bool>;

    /// Force-releases every lock held for longer than `max_age` and returns
    /// the released keys.
    async fn expire_locks(&self, max_age: Duration) -> Result<Vec<String>>;
}

/// A job taken off the queue by a worker, with its lock held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedJob {
    pub job: Job,
    pub locked_at: DateTime<Utc>,
}

/// Instant before which a lock counts as stale.
pub fn lock_cutoff(now: DateTime<Utc>, max_age: Duration) -> DateTime<Utc> {
    let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
    now.checked_sub_signed(max_age)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
