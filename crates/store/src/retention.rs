//! Retention queries against the source catalogue and time-series tables.
//!
//! Every delete is preceded by a count of the qualifying rows inside the same
//! transaction, so callers can report both numbers. Each method commits its
//! own transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_core::{ObservationType, RecordTable, Result};
use serde::Serialize;
use sqlx::{Postgres, Transaction};
use tracing::{debug, warn};

use crate::client::{storage_error, StoreClient};

/// A `recent` source whose leading rows are covered by a `historical`
/// source of the same station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Overlap {
    pub recent_source_id: i32,
    pub historical_source_id: i32,
    /// The historical source's `last_record`; recent rows before it are obsolete.
    pub threshold: DateTime<Utc>,
}

/// Rows that qualified for deletion and rows actually deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Purge {
    pub qualified: u64,
    pub deleted: u64,
}

impl Purge {
    pub fn add(&mut self, other: Purge) {
        self.qualified += other.qualified;
        self.deleted += other.deleted;
    }
}

/// Outcome of overlap pruning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverlapPrune {
    pub purge: Purge,
    /// Sources whose cached bounds changed
    pub bounds_updated: u64,
}

/// Outcome of age-based expiry on one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableExpiry {
    pub table: RecordTable,
    pub purged: Vec<(ObservationType, Purge)>,
    /// Sources whose bounds were recomputed from surviving rows
    pub bounds_updated: u64,
    /// Sources left without rows whose bounds were reset to NULL
    pub bounds_cleared: u64,
}

impl TableExpiry {
    pub fn deleted(&self) -> u64 {
        self.purged.iter().map(|(_, p)| p.deleted).sum()
    }
}

/// Storage operations needed by the retention engine.
#[async_trait]
pub trait RetentionStore: Send + Sync {
    /// Lists every (recent, historical) source pair of one station where the
    /// recent source starts before the historical one ends.
    async fn find_overlaps(&self) -> Result<Vec<Overlap>>;

    /// Deletes recent `weather` rows older than each overlap's threshold and
    /// recomputes the pruned sources' bounds, in one transaction.
    async fn prune_overlaps(&self, overlaps: &[Overlap]) -> Result<OverlapPrune>;

    /// Deletes rows of `table` owned by sources of each observation type with
    /// a timestamp before its cutoff, then recomputes source bounds, in one
    /// transaction.
    async fn expire_table(
        &self,
        table: RecordTable,
        cutoffs: &[(ObservationType, DateTime<Utc>)],
    ) -> Result<TableExpiry>;

    /// Deletes ledger entries whose URL is `LIKE pattern` and which were
    /// parsed before `cutoff`.
    async fn expire_parsed_files(&self, pattern: &str, cutoff: DateTime<Utc>) -> Result<Purge>;
}

#[async_trait]
impl RetentionStore for StoreClient {
    async fn find_overlaps(&self) -> Result<Vec<Overlap>> {
        let rows: Vec<(i32, i32, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT
                s_recent.id,
                s_historical.id,
                s_historical.last_record
            FROM sources s_recent
            JOIN sources s_historical ON (
                s_recent.wmo_station_id = s_historical.wmo_station_id AND
                s_recent.dwd_station_id = s_historical.dwd_station_id)
            WHERE
                s_recent.observation_type = $1 AND
                s_historical.observation_type = $2 AND
                s_recent.first_record < s_historical.last_record
            ORDER BY s_recent.id, s_historical.id
            "#,
        )
        .bind(ObservationType::Recent.as_str())
        .bind(ObservationType::Historical.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(storage_error)?;

        Ok(rows
            .into_iter()
            .map(|(recent_source_id, historical_source_id, threshold)| Overlap {
                recent_source_id,
                historical_source_id,
                threshold,
            })
            .collect())
    }

    async fn prune_overlaps(&self, overlaps: &[Overlap]) -> Result<OverlapPrune> {
        if overlaps.is_empty() {
            return Ok(OverlapPrune::default());
        }

        let mut tx = self.pool().begin().await.map_err(storage_error)?;
        let table = RecordTable::Weather.as_str();
        let mut purge = Purge::default();

        for overlap in overlaps {
            let qualified: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM {} WHERE source_id = $1 AND timestamp < $2",
                table
            ))
            .bind(overlap.recent_source_id)
            .bind(overlap.threshold)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_error)?;

            let deleted = sqlx::query(&format!(
                "DELETE FROM {} WHERE source_id = $1 AND timestamp < $2",
                table
            ))
            .bind(overlap.recent_source_id)
            .bind(overlap.threshold)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?
            .rows_affected();

            debug!(
                source_id = overlap.recent_source_id,
                threshold = %overlap.threshold,
                qualified = qualified,
                deleted = deleted,
                "Deleted records covered by historical source"
            );

            purge.add(Purge {
                qualified: qualified as u64,
                deleted,
            });
        }

        let mut source_ids: Vec<i32> = overlaps.iter().map(|o| o.recent_source_id).collect();
        source_ids.sort_unstable();
        source_ids.dedup();
        let bounds_updated = refresh_bounds_for(&mut tx, RecordTable::Weather, &source_ids).await?;

        tx.commit().await.map_err(storage_error)?;

        check_purge(RecordTable::Weather, ObservationType::Recent, purge);
        Ok(OverlapPrune {
            purge,
            bounds_updated,
        })
    }

    async fn expire_table(
        &self,
        table: RecordTable,
        cutoffs: &[(ObservationType, DateTime<Utc>)],
    ) -> Result<TableExpiry> {
        let mut tx = self.pool().begin().await.map_err(storage_error)?;
        let name = table.as_str();
        let mut purged = Vec::with_capacity(cutoffs.len());

        for (observation_type, cutoff) in cutoffs {
            let qualified: i64 = sqlx::query_scalar(&format!(
                r#"
                SELECT COUNT(*) FROM {} WHERE
                    source_id IN (SELECT id FROM sources WHERE observation_type = $1) AND
                    timestamp < $2
                "#,
                name
            ))
            .bind(observation_type.as_str())
            .bind(cutoff)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_error)?;

            let deleted = sqlx::query(&format!(
                r#"
                DELETE FROM {} WHERE
                    source_id IN (SELECT id FROM sources WHERE observation_type = $1) AND
                    timestamp < $2
                "#,
                name
            ))
            .bind(observation_type.as_str())
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?
            .rows_affected();

            let purge = Purge {
                qualified: qualified as u64,
                deleted,
            };
            check_purge(table, *observation_type, purge);
            purged.push((*observation_type, purge));
        }

        let bounds_updated = sqlx::query(&format!(
            r#"
            UPDATE sources SET
                first_record = record_range.first_record,
                last_record = record_range.last_record
            FROM (
                SELECT
                    source_id,
                    MIN(timestamp) AS first_record,
                    MAX(timestamp) AS last_record
                FROM {}
                GROUP BY source_id
            ) AS record_range
            WHERE
                sources.id = record_range.source_id AND (
                    sources.first_record IS DISTINCT FROM record_range.first_record OR
                    sources.last_record IS DISTINCT FROM record_range.last_record)
            "#,
            name
        ))
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?
        .rows_affected();

        let types: Vec<String> = cutoffs
            .iter()
            .map(|(t, _)| t.as_str().to_string())
            .collect();
        let bounds_cleared = sqlx::query(&format!(
            r#"
            UPDATE sources SET first_record = NULL, last_record = NULL
            WHERE
                observation_type = ANY($1) AND
                (first_record IS NOT NULL OR last_record IS NOT NULL) AND
                NOT EXISTS (SELECT 1 FROM {} t WHERE t.source_id = sources.id)
            "#,
            name
        ))
        .bind(&types)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?
        .rows_affected();

        tx.commit().await.map_err(storage_error)?;

        Ok(TableExpiry {
            table,
            purged,
            bounds_updated,
            bounds_cleared,
        })
    }

    async fn expire_parsed_files(&self, pattern: &str, cutoff: DateTime<Utc>) -> Result<Purge> {
        let mut tx = self.pool().begin().await.map_err(storage_error)?;

        let qualified: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM parsed_files WHERE url LIKE $1 AND parsed_at < $2",
        )
        .bind(pattern)
        .bind(cutoff)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error)?;

        let deleted = sqlx::query("DELETE FROM parsed_files WHERE url LIKE $1 AND parsed_at < $2")
            .bind(pattern)
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?
            .rows_affected();

        tx.commit().await.map_err(storage_error)?;

        Ok(Purge {
            qualified: qualified as u64,
            deleted,
        })
    }
}

/// Recomputes bounds for the given sources from `table`, resetting them to
/// NULL for sources without rows. Returns the number of sources changed.
async fn refresh_bounds_for(
    tx: &mut Transaction<'_, Postgres>,
    table: RecordTable,
    source_ids: &[i32],
) -> Result<u64> {
    let updated = sqlx::query(&format!(
        r#"
        UPDATE sources SET
            first_record = record_range.first_record,
            last_record = record_range.last_record
        FROM (
            SELECT
                s.id AS source_id,
                MIN(t.timestamp) AS first_record,
                MAX(t.timestamp) AS last_record
            FROM sources s
            LEFT JOIN {} t ON t.source_id = s.id
            WHERE s.id = ANY($1)
            GROUP BY s.id
        ) AS record_range
        WHERE
            sources.id = record_range.source_id AND (
                sources.first_record IS DISTINCT FROM record_range.first_record OR
                sources.last_record IS DISTINCT FROM record_range.last_record)
        "#,
        table.as_str()
    ))
    .bind(source_ids)
    .execute(&mut **tx)
    .await
    .map_err(storage_error)?
    .rows_affected();

    Ok(updated)
}

/// Counts differ only when another writer touched the same rows between the
/// count and the delete.
fn check_purge(table: RecordTable, observation_type: ObservationType, purge: Purge) {
    if purge.qualified != purge.deleted {
        warn!(
            table = %table,
            observation_type = %observation_type,
            qualified = purge.qualified,
            deleted = purge.deleted,
            "Deleted row count differs from qualifying row count"
        );
    }
}
