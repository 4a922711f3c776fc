//! Queue job types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the job that downloads, parses and stores one source file.
pub const PROCESS_JOB: &str = "process";

/// A unit of work submitted to the job queue.
///
/// The key is the source file URL and doubles as the lock key while a
/// worker processes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    pub key: String,
    /// Higher values are claimed first.
    pub priority: i32,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(name: impl Into<String>, key: impl Into<String>, priority: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            key: key.into(),
            priority,
            enqueued_at: Utc::now(),
        }
    }

    /// Creates a processing job for a source file URL.
    pub fn process(url: impl Into<String>, priority: i32) -> Self {
        Self::new(PROCESS_JOB, url, priority)
    }
}
