//! Discovered source files and their fingerprints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content fingerprint of a remote file version.
///
/// Two polls reporting an equal fingerprint for the same URL describe the
/// same file version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub file_size: Option<i64>,
}

impl Fingerprint {
    /// True when no header contributed to the fingerprint, so it cannot
    /// prove that a file is unchanged.
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none() && self.file_size.is_none()
    }

    /// Whether a ledger entry recorded with `last_modified`/`file_size`
    /// describes this same version.
    pub fn matches_ledger(&self, last_modified: Option<DateTime<Utc>>, file_size: Option<i64>) -> bool {
        if self.last_modified.is_none() && self.file_size.is_none() {
            return false;
        }
        self.last_modified == last_modified && self.file_size == file_size
    }
}

/// A specific version of a remote file, as reported by the poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedFile {
    pub url: String,
    pub fingerprint: Fingerprint,
}

impl UpdatedFile {
    pub fn new(url: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            url: url.into(),
            fingerprint,
        }
    }

    /// File name component of the URL, used for parser lookup.
    pub fn basename(&self) -> &str {
        basename(&self.url)
    }
}

/// Last path segment of a URL or filesystem path.
pub fn basename(location: &str) -> &str {
    let path = location
        .split(['?', '#'])
        .next()
        .unwrap_or(location)
        .trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}
