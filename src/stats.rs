//! Summaries over error records for dashboards and triage.

use crate::types::{ErrorCategory, ErrorRecord, ErrorSeverity};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate view over a set of error records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    /// Total records seen
    pub total: u64,
    /// Records marked resolved
    pub resolved: u64,
    /// Records still open
    pub unresolved: u64,
    /// Records from the last 24 hours
    pub last_24_hours: u64,
    /// Records from the last 7 days
    pub last_7_days: u64,
    /// Count per severity
    pub by_severity: BTreeMap<ErrorSeverity, u64>,
}

/// One category's slice of a set of error records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub total: u64,
    pub by_severity: BTreeMap<ErrorSeverity, u64>,
}

/// When a record happened: the store's insert time, or the capture
/// timestamp for records that never reached the store.
fn occurred_at(record: &ErrorRecord) -> DateTime<Utc> {
    record.created_at.unwrap_or(record.context.timestamp)
}

/// Summarize records against the current time.
pub fn summarize(records: &[ErrorRecord]) -> ErrorStats {
    summarize_at(records, Utc::now())
}

/// Like [`summarize`] with an explicit "now" for the day windows.
pub fn summarize_at(records: &[ErrorRecord], now: DateTime<Utc>) -> ErrorStats {
    let day_ago = now - Duration::hours(24);
    let week_ago = now - Duration::days(7);
    let mut stats = ErrorStats::default();
    for record in records {
        stats.total += 1;
        if record.resolved {
            stats.resolved += 1;
        } else {
            stats.unresolved += 1;
        }
        let at = occurred_at(record);
        if at > day_ago {
            stats.last_24_hours += 1;
        }
        if at > week_ago {
            stats.last_7_days += 1;
        }
        *stats.by_severity.entry(record.severity).or_insert(0) += 1;
    }
    stats
}

/// Group records by category, with a per-severity count inside each group.
pub fn group_by_category(
    records: &[ErrorRecord],
) -> BTreeMap<ErrorCategory, CategoryBreakdown> {
    let mut groups: BTreeMap<ErrorCategory, CategoryBreakdown> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(record.category).or_default();
        entry.total += 1;
        *entry.by_severity.entry(record.severity).or_insert(0) += 1;
    }
    groups
}

// Tests in tests/stats_tests.rs
