//! Job queue configuration.

use ingest_core::PROCESS_JOB;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Job queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Name of the processing job the scheduler submits
    #[serde(default = "default_job_name")]
    pub job_name: String,
    /// Locks older than this are treated as left behind by a crashed worker
    #[serde(default = "default_lock_max_age_secs")]
    pub lock_max_age_secs: u64,
}

fn default_job_name() -> String {
    PROCESS_JOB.to_string()
}

fn default_lock_max_age_secs() -> u64 {
    1800
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            job_name: default_job_name(),
            lock_max_age_secs: default_lock_max_age_secs(),
        }
    }
}

impl QueueConfig {
    pub fn lock_max_age(&self) -> Duration {
        Duration::from_secs(self.lock_max_age_secs)
    }
}
