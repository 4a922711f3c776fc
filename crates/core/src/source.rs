//! Source catalogue, time-series tables and the parsed file ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Data generation a source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationType {
    /// Observations of the last ~500 days, not yet quality controlled.
    Recent,
    /// Quality-controlled observation archive.
    Historical,
    Forecast,
    Current,
    Synop,
}

impl ObservationType {
    pub const ALL: [ObservationType; 5] = [
        Self::Recent,
        Self::Historical,
        Self::Forecast,
        Self::Current,
        Self::Synop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Historical => "historical",
            Self::Forecast => "forecast",
            Self::Current => "current",
            Self::Synop => "synop",
        }
    }

    /// Time-series table holding this observation type's records.
    pub fn table(&self) -> RecordTable {
        match self {
            Self::Synop => RecordTable::Synop,
            _ => RecordTable::Weather,
        }
    }
}

impl fmt::Display for ObservationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObservationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::invalid_argument(format!("unknown observation type: {}", s)))
    }
}

/// Allow-list of time-series tables that retention may touch.
///
/// Table identifiers in SQL are only ever produced from this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordTable {
    Weather,
    Synop,
}

impl RecordTable {
    pub const ALL: [RecordTable; 2] = [Self::Weather, Self::Synop];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Synop => "synop",
        }
    }
}

impl fmt::Display for RecordTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordTable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::invalid_argument(format!("table not allowed: {}", s)))
    }
}

/// Catalogue row for one station and observation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: i32,
    pub observation_type: ObservationType,
    pub wmo_station_id: Option<String>,
    pub dwd_station_id: Option<String>,
    /// Earliest surviving record; `None` when the source holds no rows.
    pub first_record: Option<DateTime<Utc>>,
    pub last_record: Option<DateTime<Utc>>,
}

impl Source {
    /// Whether this source and `other` describe the same physical station.
    ///
    /// Missing station ids never match, mirroring SQL `NULL = NULL`.
    pub fn same_station(&self, other: &Source) -> bool {
        fn eq(a: &Option<String>, b: &Option<String>) -> bool {
            matches!((a, b), (Some(a), Some(b)) if a == b)
        }
        eq(&self.wmo_station_id, &other.wmo_station_id)
            && eq(&self.dwd_station_id, &other.dwd_station_id)
    }

    /// `first_record <= last_record`, or both absent.
    pub fn bounds_consistent(&self) -> bool {
        match (self.first_record, self.last_record) {
            (Some(first), Some(last)) => first <= last,
            (None, None) => true,
            _ => false,
        }
    }
}

/// A single time-series row reduced to the columns retention reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordKey {
    pub source_id: i32,
    pub timestamp: DateTime<Utc>,
}

/// Ledger entry proving that a file version was ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFile {
    pub url: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub file_size: Option<i64>,
    pub parsed_at: DateTime<Utc>,
}
