//! Poll cycle: turns updated files into deduplicated processing jobs.

use ingest_core::{Job, ParserRegistry, Result, UpdatedFile};
use queue::{JobQueue, QueueConfig};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, info, warn};

use crate::poller::Poller;

/// Counts from the enqueue step of a poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnqueueSummary {
    pub enqueued: u64,
    pub already_queued: u64,
    pub already_running: u64,
    pub unknown_format: u64,
    /// Keys whose stale locks were force-released before scheduling
    pub expired_locks: Vec<String>,
    /// Pending jobs after this cycle: `enqueued` plus those already pending
    pub queue_size: u64,
}

/// Result of one poll cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PollCycle {
    /// Everything the poller reported, in discovery order
    pub files: Vec<UpdatedFile>,
    /// `None` for dry runs
    pub summary: Option<EnqueueSummary>,
}

/// Polls for updated files and submits a processing job for each one that
/// is neither pending nor being processed.
///
/// The scheduler only reads lock state; the single exception is force-expiring
/// locks older than [`QueueConfig::lock_max_age`].
pub struct PollScheduler {
    poller: Arc<dyn Poller>,
    queue: Arc<dyn JobQueue>,
    registry: Arc<ParserRegistry>,
    config: QueueConfig,
}

impl PollScheduler {
    pub fn new(
        poller: Arc<dyn Poller>,
        queue: Arc<dyn JobQueue>,
        registry: Arc<ParserRegistry>,
        config: QueueConfig,
    ) -> Self {
        Self {
            poller,
            queue,
            registry,
            config,
        }
    }

    /// Runs one cycle. With `enqueue = false` the queue is left untouched.
    pub async fn run_poll_cycle(&self, enqueue: bool) -> Result<PollCycle> {
        let start = Instant::now();
        metrics().polls.inc();

        let files = self.poller.poll().await.inspect_err(|e| {
            metrics().poll_errors.inc();
            warn!(error = %e, "Poll failed");
        })?;
        metrics().files_discovered.inc_by(files.len() as u64);
        info!(files = files.len(), enqueue = enqueue, "Polled updated files");

        let summary = if enqueue {
            Some(self.enqueue(&files).await?)
        } else {
            None
        };

        metrics()
            .poll_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        Ok(PollCycle { files, summary })
    }

    async fn enqueue(&self, files: &[UpdatedFile]) -> Result<EnqueueSummary> {
        let mut summary = EnqueueSummary::default();

        let expired = self.queue.expire_locks(self.config.lock_max_age()).await?;
        if !expired.is_empty() {
            warn!("Removed expired locks: {}", expired.join(", "));
            metrics().locks_expired.inc_by(expired.len() as u64);
        }
        summary.expired_locks = expired;

        let mut pending: HashSet<String> = self.queue.pending_keys(&self.config.job_name).await?;
        let already_pending = pending.len() as u64;

        for file in files {
            let url = &file.url;
            if pending.contains(url) {
                debug!(url = %url, "Skipping: already queued");
                summary.already_queued += 1;
                continue;
            }
            if self.queue.is_locked(url).await? {
                debug!(url = %url, "Skipping: already running");
                summary.already_running += 1;
                continue;
            }

            let parser = match self.registry.resolve(file.basename()) {
                Ok(parser) => parser,
                Err(e) if e.is_recoverable() => {
                    warn!(url = %url, error = %e, "Skipping file with unknown format");
                    summary.unknown_format += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let job = Job::new(&self.config.job_name, url, parser.priority);
            self.queue.submit(&job).await?;
            debug!(url = %url, parser = %parser.name, priority = job.priority, "Enqueued");
            pending.insert(url.clone());
            summary.enqueued += 1;
        }

        summary.queue_size = summary.enqueued + already_pending;

        let m = metrics();
        m.jobs_enqueued.inc_by(summary.enqueued);
        m.jobs_skipped_queued.inc_by(summary.already_queued);
        m.jobs_skipped_running.inc_by(summary.already_running);
        m.unknown_formats.inc_by(summary.unknown_format);
        m.queue_depth.set(summary.queue_size);

        info!(
            "Enqueued {} updated files for processing. Queue size: {}",
            summary.enqueued, summary.queue_size
        );
        Ok(summary)
    }
}
