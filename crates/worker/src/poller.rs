//! Source pollers: discover which remote files changed since they were
//! last ingested.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ingest_core::{Error, Fingerprint, Result, UpdatedFile};
use reqwest::header::{HeaderMap, HeaderName, CONTENT_LENGTH, ETAG, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use store::FingerprintLedger;
use tracing::{debug, warn};

/// Discovers updated source files.
#[async_trait]
pub trait Poller: Send + Sync {
    /// Files whose current version has not been ingested yet, in discovery order.
    async fn poll(&self) -> Result<Vec<UpdatedFile>>;
}

/// HTTP poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Source file URLs to watch
    #[serde(default)]
    pub urls: Vec<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Poller that fingerprints a fixed list of URLs with `HEAD` requests.
///
/// A file is reported when the ledger has no entry for it or the entry's
/// fingerprint differs from the current one.
pub struct HttpPoller {
    client: reqwest::Client,
    urls: Vec<String>,
    ledger: Arc<dyn FingerprintLedger>,
}

impl HttpPoller {
    pub fn new(config: &PollerConfig, ledger: Arc<dyn FingerprintLedger>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let mut urls = Vec::with_capacity(config.urls.len());
        for url in &config.urls {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }

        Ok(Self {
            client,
            urls,
            ledger,
        })
    }

    async fn fingerprint(&self, url: &str) -> Result<Fingerprint> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::poll(format!("HEAD {}: {}", url, e)))?;
        Ok(fingerprint_from_headers(response.headers()))
    }
}

#[async_trait]
impl Poller for HttpPoller {
    async fn poll(&self) -> Result<Vec<UpdatedFile>> {
        let mut current = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            match self.fingerprint(url).await {
                Ok(fingerprint) => current.push(UpdatedFile::new(url.clone(), fingerprint)),
                Err(e) => warn!(url = %url, error = %e, "Failed to fingerprint file"),
            }
        }

        let urls: Vec<String> = current.iter().map(|f| f.url.clone()).collect();
        let known = self
            .ledger
            .known_files(&urls)
            .await
            .map_err(|e| Error::poll(format!("ledger lookup failed: {}", e)))?;

        let updated: Vec<UpdatedFile> = current
            .into_iter()
            .filter(|file| match known.get(&file.url) {
                Some(parsed) => {
                    let unchanged = file
                        .fingerprint
                        .matches_ledger(parsed.last_modified, parsed.file_size);
                    if unchanged {
                        debug!(url = %file.url, "Skipping unchanged file");
                    }
                    !unchanged
                }
                None => true,
            })
            .collect();

        debug!(
            watched = self.urls.len(),
            updated = updated.len(),
            "Poll complete"
        );
        Ok(updated)
    }
}

/// Builds a fingerprint from `ETag`, `Last-Modified` and `Content-Length`.
pub fn fingerprint_from_headers(headers: &HeaderMap) -> Fingerprint {
    let text = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());

    Fingerprint {
        etag: text(ETAG).map(str::to_string),
        last_modified: text(LAST_MODIFIED)
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|t| t.with_timezone(&Utc)),
        file_size: text(CONTENT_LENGTH).and_then(|v| v.trim().parse().ok()),
    }
}
