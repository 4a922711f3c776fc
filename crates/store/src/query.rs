//! Catalogue and record queries (used by ingestion, tests and admin).

use chrono::{DateTime, Utc};
use ingest_core::{Error, ObservationType, RecordTable, Result, Source};

use crate::client::{storage_error, StoreClient};

/// Fields needed to register a source.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub observation_type: ObservationType,
    pub wmo_station_id: Option<String>,
    pub dwd_station_id: Option<String>,
    pub station_name: Option<String>,
}

type SourceRow = (
    i32,
    String,
    Option<String>,
    Option<String>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
);

fn source_from_row(row: SourceRow) -> Result<Source> {
    let (id, observation_type, wmo_station_id, dwd_station_id, first_record, last_record) = row;
    let observation_type = observation_type
        .parse()
        .map_err(|e: Error| Error::storage(format!("source {}: {}", id, e)))?;
    Ok(Source {
        id,
        observation_type,
        wmo_station_id,
        dwd_station_id,
        first_record,
        last_record,
    })
}

/// Inserts a source, or returns the id of the existing one for the same key.
pub async fn upsert_source(client: &StoreClient, source: &NewSource) -> Result<i32> {
    let id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO sources (observation_type, wmo_station_id, dwd_station_id, station_name)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT ON CONSTRAINT sources_key DO UPDATE SET
            station_name = COALESCE(EXCLUDED.station_name, sources.station_name)
        RETURNING id
        "#,
    )
    .bind(source.observation_type.as_str())
    .bind(&source.wmo_station_id)
    .bind(&source.dwd_station_id)
    .bind(&source.station_name)
    .fetch_one(client.pool())
    .await
    .map_err(storage_error)?;
    Ok(id)
}

/// Fetches one source by id.
pub async fn get_source(client: &StoreClient, id: i32) -> Result<Option<Source>> {
    let row: Option<SourceRow> = sqlx::query_as(
        r#"
        SELECT id, observation_type, wmo_station_id, dwd_station_id, first_record, last_record
        FROM sources WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(client.pool())
    .await
    .map_err(storage_error)?;

    row.map(source_from_row).transpose()
}

/// Lists all sources ordered by id.
pub async fn list_sources(client: &StoreClient) -> Result<Vec<Source>> {
    let rows: Vec<SourceRow> = sqlx::query_as(
        r#"
        SELECT id, observation_type, wmo_station_id, dwd_station_id, first_record, last_record
        FROM sources ORDER BY id
        "#,
    )
    .fetch_all(client.pool())
    .await
    .map_err(storage_error)?;

    rows.into_iter().map(source_from_row).collect()
}

/// Inserts bare records (timestamps only) for a source and extends the
/// source's bounds to cover them.
pub async fn insert_records(
    client: &StoreClient,
    table: RecordTable,
    source_id: i32,
    timestamps: &[DateTime<Utc>],
) -> Result<u64> {
    if timestamps.is_empty() {
        return Ok(0);
    }

    let mut tx = client.pool().begin().await.map_err(storage_error)?;

    let inserted = sqlx::query(&format!(
        r#"
        INSERT INTO {} (timestamp, source_id)
        SELECT ts, $2 FROM UNNEST($1::timestamptz[]) AS ts
        ON CONFLICT DO NOTHING
        "#,
        table.as_str()
    ))
    .bind(timestamps)
    .bind(source_id)
    .execute(&mut *tx)
    .await
    .map_err(storage_error)?
    .rows_affected();

    let first = timestamps.iter().min().copied();
    let last = timestamps.iter().max().copied();
    sqlx::query(
        r#"
        UPDATE sources SET
            first_record = LEAST(first_record, $2),
            last_record = GREATEST(last_record, $3)
        WHERE id = $1
        "#,
    )
    .bind(source_id)
    .bind(first)
    .bind(last)
    .execute(&mut *tx)
    .await
    .map_err(storage_error)?;

    tx.commit().await.map_err(storage_error)?;
    Ok(inserted)
}

/// Timestamps of a source's records in ascending order.
pub async fn record_timestamps(
    client: &StoreClient,
    table: RecordTable,
    source_id: i32,
) -> Result<Vec<DateTime<Utc>>> {
    sqlx::query_scalar(&format!(
        "SELECT timestamp FROM {} WHERE source_id = $1 ORDER BY timestamp",
        table.as_str()
    ))
    .bind(source_id)
    .fetch_all(client.pool())
    .await
    .map_err(storage_error)
}

/// Total number of rows in a time-series table.
pub async fn count_records(client: &StoreClient, table: RecordTable) -> Result<u64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table.as_str()))
        .fetch_one(client.pool())
        .await
        .map_err(storage_error)?;
    Ok(count as u64)
}

/// Total number of ledger rows.
pub async fn count_parsed_files(client: &StoreClient) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parsed_files")
        .fetch_one(client.pool())
        .await
        .map_err(storage_error)?;
    Ok(count as u64)
}
