//! Worker scheduler for background tasks.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use ingest_core::Error;
use telemetry::{health, log_report, log_snapshot, metrics, HealthRegistry};

use crate::enqueue::PollScheduler;
use crate::retention::RetentionEngine;

/// Worker scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Seconds between poll cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds between retention runs
    #[serde(default = "default_retention_interval_secs")]
    pub retention_interval_secs: u64,
    /// Seconds between metrics log lines
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
    /// Submit jobs for updated files (false = poll only)
    #[serde(default = "default_enqueue")]
    pub enqueue: bool,
}

fn default_poll_interval_secs() -> u64 {
    600 // 10 minutes
}

fn default_retention_interval_secs() -> u64 {
    3600 // 1 hour
}

fn default_metrics_interval_secs() -> u64 {
    60
}

fn default_enqueue() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            retention_interval_secs: default_retention_interval_secs(),
            metrics_interval_secs: default_metrics_interval_secs(),
            enqueue: default_enqueue(),
        }
    }
}

impl WorkerConfig {
    fn period(secs: u64) -> Duration {
        Duration::from_secs(secs.max(1))
    }
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    config: WorkerConfig,
    poll: Arc<PollScheduler>,
    retention: Arc<RetentionEngine>,
}

impl WorkerScheduler {
    pub fn new(
        config: WorkerConfig,
        poll: Arc<PollScheduler>,
        retention: Arc<RetentionEngine>,
    ) -> Self {
        Self {
            config,
            poll,
            retention,
        }
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_poll_worker().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_retention_worker().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_metrics_log().await;
        }));

        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            retention_interval_secs = self.config.retention_interval_secs,
            enqueue = self.config.enqueue,
            "Background workers started"
        );
        handles
    }

    async fn run_poll_worker(&self) {
        let mut ticker = interval(WorkerConfig::period(self.config.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.poll.run_poll_cycle(self.config.enqueue).await {
                Ok(_) => record_outcome(health(), self.config.enqueue, Ok(())),
                Err(e) => {
                    error!("Poll worker error: {}", e);
                    record_outcome(health(), self.config.enqueue, Err(&e));
                }
            }
        }
    }

    async fn run_retention_worker(&self) {
        let mut ticker = interval(WorkerConfig::period(self.config.retention_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.retention.run().await {
                Ok(_) => record_outcome(health(), false, Ok(())),
                Err(e) => {
                    error!("Retention worker error: {}", e);
                    record_outcome(health(), false, Err(&e));
                }
            }
        }
    }

    async fn run_metrics_log(&self) {
        let mut ticker = interval(WorkerConfig::period(self.config.metrics_interval_secs));

        loop {
            ticker.tick().await;
            log_snapshot(&metrics().snapshot());
            log_report(&health().report());
        }
    }
}

/// Updates component health after a poll cycle or retention run.
///
/// Success proves the database reachable, and the queue too when it was
/// used. Failures only mark the component the error came from.
fn record_outcome(registry: &HealthRegistry, used_queue: bool, outcome: Result<(), &Error>) {
    match outcome {
        Ok(()) => {
            registry.database.set_healthy();
            if used_queue {
                registry.queue.set_healthy();
            }
        }
        Err(Error::Storage(msg)) => registry.database.set_unhealthy(msg.clone()),
        Err(Error::Queue(msg)) => registry.queue.set_unhealthy(msg.clone()),
        Err(_) => {}
    }
}
