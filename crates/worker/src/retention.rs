//! Retention engine: removes weather data that is no longer needed.
//!
//! A run makes three passes in a fixed order, each committed on its own:
//!
//! 1. Overlap pruning drops `recent` rows already covered by a `historical`
//!    source of the same station.
//! 2. Age-based expiry deletes rows older than their observation type's
//!    retention window and recomputes source bounds.
//! 3. Ledger expiry forgets parsed files matching a URL pattern after their
//!    retention window.

use chrono::{DateTime, Utc};
use ingest_core::{ObservationType, Result, RetentionPolicy};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use store::{OverlapPrune, Purge, RetentionStore, TableExpiry};
use telemetry::metrics;
use tracing::{debug, error, info};

/// Ledger expiry outcome for one pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerExpiry {
    pub pattern: String,
    pub purge: Purge,
}

/// Counts from one retention run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionReport {
    pub started_at: Option<DateTime<Utc>>,
    /// Overlapping (recent, historical) pairs found
    pub overlaps: usize,
    pub pruned: OverlapPrune,
    pub expired: Vec<TableExpiry>,
    pub ledger: Vec<LedgerExpiry>,
}

impl RetentionReport {
    /// Time-series rows deleted across the overlap and expiry passes.
    pub fn records_deleted(&self) -> u64 {
        self.pruned.purge.deleted + self.expired.iter().map(TableExpiry::deleted).sum::<u64>()
    }

    pub fn parsed_files_deleted(&self) -> u64 {
        self.ledger.iter().map(|l| l.purge.deleted).sum()
    }

    /// Whether the run changed anything at all.
    pub fn is_noop(&self) -> bool {
        self.records_deleted() == 0
            && self.parsed_files_deleted() == 0
            && self.pruned.bounds_updated == 0
            && self
                .expired
                .iter()
                .all(|e| e.bounds_updated == 0 && e.bounds_cleared == 0)
    }
}

/// Applies a [`RetentionPolicy`] to a [`RetentionStore`].
pub struct RetentionEngine {
    store: Arc<dyn RetentionStore>,
    policy: RetentionPolicy,
}

impl RetentionEngine {
    /// Fails with a config error if the policy is invalid.
    pub fn new(store: Arc<dyn RetentionStore>, policy: RetentionPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { store, policy })
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    pub async fn run(&self) -> Result<RetentionReport> {
        self.run_at(Utc::now()).await
    }

    /// Runs all passes with cutoffs relative to `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RetentionReport> {
        let start = Instant::now();
        metrics().retention_runs.inc();

        let result = self.run_passes(now).await;
        metrics()
            .retention_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match &result {
            Ok(report) => info!(
                records_deleted = report.records_deleted(),
                parsed_files_deleted = report.parsed_files_deleted(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Retention run complete"
            ),
            Err(e) => {
                metrics().retention_errors.inc();
                error!(error = %e, "Retention run failed");
            }
        }
        result
    }

    async fn run_passes(&self, now: DateTime<Utc>) -> Result<RetentionReport> {
        let mut report = RetentionReport {
            started_at: Some(now),
            ..Default::default()
        };

        if self.policy.prune_overlaps {
            self.prune_overlaps(&mut report).await?;
        }
        self.expire_records(now, &mut report).await?;
        self.expire_parsed_files(now, &mut report).await?;

        Ok(report)
    }

    async fn prune_overlaps(&self, report: &mut RetentionReport) -> Result<()> {
        info!("Deleting obsolete 'recent' weather records");
        let overlaps = self.store.find_overlaps().await?;
        report.overlaps = overlaps.len();

        if overlaps.is_empty() {
            debug!("No overlapping recent sources");
            return Ok(());
        }

        for overlap in &overlaps {
            debug!(
                recent = overlap.recent_source_id,
                historical = overlap.historical_source_id,
                threshold = %overlap.threshold,
                "Pruning overlap"
            );
        }

        let pruned = self.store.prune_overlaps(&overlaps).await?;
        info!(
            "Deleted {} obsolete 'recent' weather records from {} sources",
            pruned.purge.deleted,
            overlaps.len()
        );

        metrics().records_pruned.inc_by(pruned.purge.deleted);
        metrics().bounds_updated.inc_by(pruned.bounds_updated);
        report.pruned = pruned;
        Ok(())
    }

    async fn expire_records(&self, now: DateTime<Utc>, report: &mut RetentionReport) -> Result<()> {
        for (table, rules) in self.policy.expiry_by_table() {
            let cutoffs: Vec<(ObservationType, DateTime<Utc>)> = rules
                .iter()
                .map(|rule| (rule.observation_type, rule.cutoff(now)))
                .collect();

            for rule in &rules {
                info!(
                    "Deleting expired {} records: {} older than {} hours",
                    table, rule.observation_type, rule.retain_hours
                );
            }

            let expiry = self.store.expire_table(table, &cutoffs).await?;
            for (observation_type, purge) in &expiry.purged {
                info!(
                    "Deleted {} outdated {} weather records from {}",
                    purge.deleted, observation_type, table
                );
            }
            if expiry.bounds_updated > 0 || expiry.bounds_cleared > 0 {
                debug!(
                    table = %table,
                    updated = expiry.bounds_updated,
                    cleared = expiry.bounds_cleared,
                    "Recomputed source bounds"
                );
            }

            metrics().records_expired.inc_by(expiry.deleted());
            metrics()
                .bounds_updated
                .inc_by(expiry.bounds_updated + expiry.bounds_cleared);
            report.expired.push(expiry);
        }
        Ok(())
    }

    async fn expire_parsed_files(
        &self,
        now: DateTime<Utc>,
        report: &mut RetentionReport,
    ) -> Result<()> {
        for rule in &self.policy.ledger {
            info!("Deleting expired parsed files matching '{}'", rule.pattern);
            let purge = self
                .store
                .expire_parsed_files(&rule.pattern, rule.cutoff(now))
                .await?;
            info!(
                "Deleted {} outdated parsed files for pattern '{}'",
                purge.deleted, rule.pattern
            );

            metrics().parsed_files_expired.inc_by(purge.deleted);
            report.ledger.push(LedgerExpiry {
                pattern: rule.pattern.clone(),
                purge,
            });
        }
        Ok(())
    }
}
