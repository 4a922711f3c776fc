//! Internal metrics collection.
//!
//! Collects metrics in-memory; the worker scheduler logs periodic snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// A gauge metric holding the last observed value.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for weather ingestion.
#[derive(Debug, Default)]
pub struct Metrics {
    // Scheduler metrics
    pub polls: Counter,
    pub poll_errors: Counter,
    pub files_discovered: Counter,
    pub jobs_enqueued: Counter,
    pub jobs_skipped_queued: Counter,
    pub jobs_skipped_running: Counter,
    pub unknown_formats: Counter,
    pub locks_expired: Counter,

    // Retention metrics
    pub retention_runs: Counter,
    pub retention_errors: Counter,
    pub records_pruned: Counter,
    pub records_expired: Counter,
    pub parsed_files_expired: Counter,
    pub bounds_updated: Counter,

    // Latency histograms
    pub poll_latency_ms: Histogram,
    pub retention_latency_ms: Histogram,

    // Gauges
    pub queue_depth: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub polls: u64,
    pub poll_errors: u64,
    pub files_discovered: u64,
    pub jobs_enqueued: u64,
    pub jobs_skipped_queued: u64,
    pub jobs_skipped_running: u64,
    pub unknown_formats: u64,
    pub locks_expired: u64,
    pub retention_runs: u64,
    pub retention_errors: u64,
    pub records_pruned: u64,
    pub records_expired: u64,
    pub parsed_files_expired: u64,
    pub bounds_updated: u64,
    pub poll_latency_mean_ms: f64,
    pub retention_latency_mean_ms: f64,
    pub queue_depth: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            polls: self.polls.get(),
            poll_errors: self.poll_errors.get(),
            files_discovered: self.files_discovered.get(),
            jobs_enqueued: self.jobs_enqueued.get(),
            jobs_skipped_queued: self.jobs_skipped_queued.get(),
            jobs_skipped_running: self.jobs_skipped_running.get(),
            unknown_formats: self.unknown_formats.get(),
            locks_expired: self.locks_expired.get(),
            retention_runs: self.retention_runs.get(),
            retention_errors: self.retention_errors.get(),
            records_pruned: self.records_pruned.get(),
            records_expired: self.records_expired.get(),
            parsed_files_expired: self.parsed_files_expired.get(),
            bounds_updated: self.bounds_updated.get(),
            poll_latency_mean_ms: self.poll_latency_ms.mean(),
            retention_latency_mean_ms: self.retention_latency_ms.mean(),
            queue_depth: self.queue_depth.get(),
        }
    }
}

/// Logs a snapshot as one structured event.
pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    tracing::info!(
        polls = snapshot.polls,
        poll_errors = snapshot.poll_errors,
        files_discovered = snapshot.files_discovered,
        jobs_enqueued = snapshot.jobs_enqueued,
        jobs_skipped_queued = snapshot.jobs_skipped_queued,
        jobs_skipped_running = snapshot.jobs_skipped_running,
        unknown_formats = snapshot.unknown_formats,
        locks_expired = snapshot.locks_expired,
        retention_runs = snapshot.retention_runs,
        retention_errors = snapshot.retention_errors,
        records_pruned = snapshot.records_pruned,
        records_expired = snapshot.records_expired,
        parsed_files_expired = snapshot.parsed_files_expired,
        bounds_updated = snapshot.bounds_updated,
        poll_latency_mean_ms = snapshot.poll_latency_mean_ms,
        retention_latency_mean_ms = snapshot.retention_latency_mean_ms,
        queue_depth = snapshot.queue_depth,
        "Metrics snapshot"
    );
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
