//! Retention policy definitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::source::{ObservationType, RecordTable};

/// Longest accepted retention window, one hundred years.
pub const MAX_RETAIN_HOURS: u64 = 100 * 366 * 24;

/// `retain_hours` before `now`, clamped to the earliest representable
/// instant when the window does not fit.
fn hours_before(now: DateTime<Utc>, retain_hours: u64) -> DateTime<Utc> {
    i64::try_from(retain_hours)
        .ok()
        .and_then(Duration::try_hours)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Age-based expiry of one observation type's rows in one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryRule {
    pub table: RecordTable,
    pub observation_type: ObservationType,
    pub retain_hours: u64,
}

impl ExpiryRule {
    pub fn new(table: RecordTable, observation_type: ObservationType, retain_hours: u64) -> Self {
        Self {
            table,
            observation_type,
            retain_hours,
        }
    }

    /// Rows with a timestamp strictly before this instant are expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        hours_before(now, self.retain_hours)
    }
}

/// Age-based expiry of parsed file ledger entries whose URL matches a
/// SQL `LIKE` pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRule {
    pub pattern: String,
    pub retain_hours: u64,
}

impl LedgerRule {
    pub fn new(pattern: impl Into<String>, retain_hours: u64) -> Self {
        Self {
            pattern: pattern.into(),
            retain_hours,
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        hours_before(now, self.retain_hours)
    }

    pub fn matches(&self, url: &str) -> bool {
        like_matches(&self.pattern, url)
    }
}

/// Retention policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Delete `recent` weather rows already covered by a `historical` source
    #[serde(default = "default_prune_overlaps")]
    pub prune_overlaps: bool,
    /// Time-series expiry rules
    #[serde(default = "default_expiry_rules")]
    pub expiry: Vec<ExpiryRule>,
    /// Parsed file ledger expiry rules
    #[serde(default = "default_ledger_rules")]
    pub ledger: Vec<LedgerRule>,
}

fn default_prune_overlaps() -> bool {
    true
}

fn default_expiry_rules() -> Vec<ExpiryRule> {
    vec![
        ExpiryRule::new(RecordTable::Weather, ObservationType::Forecast, 3),
        ExpiryRule::new(RecordTable::Weather, ObservationType::Current, 48),
        ExpiryRule::new(RecordTable::Synop, ObservationType::Synop, 30),
    ]
}

fn default_ledger_rules() -> Vec<LedgerRule> {
    // SYNOP station messages, one week
    vec![LedgerRule::new("%/Z__C_EDZW_%", 7 * 24)]
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            prune_overlaps: default_prune_overlaps(),
            expiry: default_expiry_rules(),
            ledger: default_ledger_rules(),
        }
    }
}

impl RetentionPolicy {
    /// Checks the policy before any rule is applied.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for rule in &self.expiry {
            if rule.retain_hours == 0 {
                return Err(Error::config(format!(
                    "retention for {}/{} must be at least one hour",
                    rule.table, rule.observation_type
                )));
            }
            if rule.retain_hours > MAX_RETAIN_HOURS {
                return Err(Error::config(format!(
                    "retention for {}/{} exceeds {} hours",
                    rule.table, rule.observation_type, MAX_RETAIN_HOURS
                )));
            }
            if rule.observation_type.table() != rule.table {
                return Err(Error::config(format!(
                    "{} records are not stored in table {}",
                    rule.observation_type, rule.table
                )));
            }
            if !seen.insert((rule.table, rule.observation_type)) {
                return Err(Error::config(format!(
                    "duplicate retention rule for {}/{}",
                    rule.table, rule.observation_type
                )));
            }
        }

        for rule in &self.ledger {
            if rule.pattern.trim().is_empty() || rule.pattern.chars().all(|c| c == '%') {
                return Err(Error::config(format!(
                    "ledger pattern {:?} would match every file",
                    rule.pattern
                )));
            }
            if rule.retain_hours == 0 {
                return Err(Error::config(format!(
                    "retention for ledger pattern {:?} must be at least one hour",
                    rule.pattern
                )));
            }
            if rule.retain_hours > MAX_RETAIN_HOURS {
                return Err(Error::config(format!(
                    "retention for ledger pattern {:?} exceeds {} hours",
                    rule.pattern, MAX_RETAIN_HOURS
                )));
            }
        }

        Ok(())
    }

    /// Expiry rules grouped by table, in table order.
    pub fn expiry_by_table(&self) -> BTreeMap<RecordTable, Vec<&ExpiryRule>> {
        let mut grouped: BTreeMap<RecordTable, Vec<&ExpiryRule>> = BTreeMap::new();
        for rule in &self.expiry {
            grouped.entry(rule.table).or_default().push(rule);
        }
        grouped
    }
}

/// SQL `LIKE` matching: `%` matches any run of characters, `_` exactly one.
///
/// There is no escape character; patterns are trusted configuration.
pub fn like_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if let Some((bp, bt)) = backtrack {
            p = bp + 1;
            t = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '%')
}
