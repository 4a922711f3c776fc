//! Parsed file ledger: which file versions have already been ingested.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_core::{Fingerprint, ParsedFile, Result};
use std::collections::HashMap;

use crate::client::{storage_error, StoreClient};

/// Read access to the ledger, used by pollers to skip unchanged files.
#[async_trait]
pub trait FingerprintLedger: Send + Sync {
    /// Ledger entries for the given URLs, keyed by URL.
    async fn known_files(&self, urls: &[String]) -> Result<HashMap<String, ParsedFile>>;
}

type ParsedFileRow = (String, Option<DateTime<Utc>>, Option<i64>, DateTime<Utc>);

#[async_trait]
impl FingerprintLedger for StoreClient {
    async fn known_files(&self, urls: &[String]) -> Result<HashMap<String, ParsedFile>> {
        if urls.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<ParsedFileRow> = sqlx::query_as(
            "SELECT url, last_modified, file_size, parsed_at FROM parsed_files WHERE url = ANY($1)",
        )
        .bind(urls)
        .fetch_all(self.pool())
        .await
        .map_err(storage_error)?;

        Ok(rows
            .into_iter()
            .map(|(url, last_modified, file_size, parsed_at)| {
                let file = ParsedFile {
                    url: url.clone(),
                    last_modified,
                    file_size,
                    parsed_at,
                };
                (url, file)
            })
            .collect())
    }
}

impl StoreClient {
    /// Records that a file version was ingested at `parsed_at`.
    pub async fn record_parsed(
        &self,
        url: &str,
        fingerprint: &Fingerprint,
        parsed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO parsed_files (url, last_modified, file_size, parsed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (url) DO UPDATE SET
                last_modified = EXCLUDED.last_modified,
                file_size = EXCLUDED.file_size,
                parsed_at = EXCLUDED.parsed_at
            "#,
        )
        .bind(url)
        .bind(fingerprint.last_modified)
        .bind(fingerprint.file_size)
        .bind(parsed_at)
        .execute(self.pool())
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}
