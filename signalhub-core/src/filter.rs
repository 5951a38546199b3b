use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::{Entry, EntryKind};
use crate::level::Level;

/// Filter used by `query`/`query_alerts` (spec §6.2). All fields are
/// optional and AND-combined.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryFilter {
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub levels_min: Option<Level>,
    #[serde(default)]
    pub metric_names: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub text_contains: Option<String>,
}

impl QueryFilter {
    pub fn matches(&self, entry: &Entry) -> bool {
        if !self.sources.is_empty() && !self.sources.iter().any(|s| s == &entry.source) {
            return false;
        }
        if !self.components.is_empty() && !self.components.iter().any(|c| c == &entry.component) {
            return false;
        }
        if let Some(floor) = self.levels_min {
            match entry.kind.level() {
                Some(level) if level.floor_matches(floor) => {}
                Some(_) => return false,
                None => {
                    // Metric entries have no level; levels_min only
                    // constrains log entries.
                }
            }
        }
        if !self.metric_names.is_empty() {
            match &entry.kind {
                EntryKind::Metric { metric_name, .. } => {
                    if !self.metric_names.iter().any(|m| m == metric_name) {
                        return false;
                    }
                }
                EntryKind::Log { .. } => return false,
            }
        }
        for (k, v) in &self.tags {
            match entry.tags.get(k) {
                Some(actual) if actual == v => {}
                _ => return false,
            }
        }
        if let Some(needle) = &self.text_contains {
            let haystack = match &entry.kind {
                EntryKind::Log { message, .. } => message.as_str(),
                EntryKind::Metric { metric_name, .. } => metric_name.as_str(),
            };
            if !haystack.contains(needle.as_str()) {
                return false;
            }
        }
        true
    }
}

/// A half-open `[start, end)` time range, as used by `query` (spec §6.2)
/// and `prune` (spec §4.B).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn log(source: &str, component: &str, level: Level, message: &str) -> Entry {
        Entry::new_log(Utc::now(), source, component, level, message, Map::new(), None, None).unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        let e = log("app", "api", Level::Info, "hi");
        assert!(QueryFilter::default().matches(&e));
    }

    #[test]
    fn sources_filter_is_exact_match_any_of() {
        let e = log("app", "api", Level::Info, "hi");
        let mut f = QueryFilter::default();
        f.sources = vec!["other".to_string()];
        assert!(!f.matches(&e));
        f.sources = vec!["app".to_string()];
        assert!(f.matches(&e));
    }

    #[test]
    fn levels_min_excludes_lower_levels() {
        let e = log("database.redis", "primary", Level::Info, "hi");
        let mut f = QueryFilter::default();
        f.levels_min = Some(Level::Warn);
        assert!(!f.matches(&e));

        let e2 = log("database.redis", "primary", Level::Error, "hi");
        assert!(f.matches(&e2));
    }
}
