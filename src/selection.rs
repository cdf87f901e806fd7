use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default time range applied when the builder has not picked one.
pub const DEFAULT_TIME_RANGE_LOWER: &str = "now() - 1h";

/// A (database, retention policy) pair identifying where a measurement lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbRp {
    pub database: String,
    pub retention_policy: String,
}

/// One tag-value equality constraint picked in the builder.
///
/// Constraints arrive as a flat list; grouping by key happens at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagValue {
    pub key: String,
    pub value: String,
}

/// Query time bounds. Each bound is an opaque expression, absolute
/// (`2023-01-01T00:00:00Z`) or relative (`now() - 1h`); this crate never
/// interprets them, it only compares them to detect a changed range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub lower: String,
    #[serde(default)]
    pub upper: Option<String>,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            lower: DEFAULT_TIME_RANGE_LOWER.to_string(),
            upper: None,
        }
    }
}

/// An immutable-per-update snapshot of the query builder's state.
///
/// Produced by the builder UI on every interaction; the synchronizer never
/// retains one beyond the call it was passed to. Identifiers are treated as
/// opaque strings and are not sanitized here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Ordered field names; empty means "all fields".
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub measurement: Option<String>,
    #[serde(default)]
    pub dbrp: Option<DbRp>,
    #[serde(default)]
    pub tag_values: Vec<TagValue>,
    #[serde(default)]
    pub time_range: TimeRange,
}

impl Selection {
    /// Tag values grouped by key, keys in deterministic order.
    pub fn grouped_tag_values(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for tv in &self.tag_values {
            grouped.entry(&tv.key).or_default().push(&tv.value);
        }
        grouped
    }
}

/// Keys added and removed between two selection snapshots.
///
/// Covers field names and `key=value` tag constraints; a caller uses this
/// (together with a time-range comparison) to skip redundant buffer writes.
/// The synchronizer itself does not gate on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl SelectionDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Diff two selections into added/removed keys.
pub fn diff(previous: &Selection, next: &Selection) -> SelectionDiff {
    let prev_keys = selection_keys(previous);
    let next_keys = selection_keys(next);
    SelectionDiff {
        added: next_keys.difference(&prev_keys).cloned().collect(),
        removed: prev_keys.difference(&next_keys).cloned().collect(),
    }
}

fn selection_keys(selection: &Selection) -> BTreeSet<String> {
    let mut keys: BTreeSet<String> = selection.fields.iter().cloned().collect();
    if let Some(m) = &selection.measurement {
        keys.insert(format!("measurement\u{0}{m}"));
    }
    for tv in &selection.tag_values {
        keys.insert(format!("{}\u{0}{}", tv.key, tv.value));
    }
    keys
}
