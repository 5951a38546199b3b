//! Subscription filters (spec §3.5): source-glob, component-glob,
//! level-floor, and a tag-match map, compiled once at subscription time so
//! the fanout loop never re-parses a pattern per Entry. Glob compilation via
//! `globset`, the crate the teacher's subscription filters reach for,
//! matching `dashflow-streaming`'s precompiled-predicate pattern for topic
//! routing.

use std::collections::BTreeMap;

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use signalhub_core::{Alert, Entry, EntryKind, Level};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("invalid source glob {0:?}: {1}")]
    InvalidSourceGlob(String, String),
    #[error("invalid component glob {0:?}: {1}")]
    InvalidComponentGlob(String, String),
}

/// A subscriber's requested view of the stream. Globs default to `*`
/// (match everything) when not supplied. Deserializes directly from the
/// `subscribe {id, filter}` push-stream frame and the `subscribe` RPC
/// params (spec §6.3/§6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionSpec {
    pub source_glob: String,
    pub component_glob: String,
    pub level_floor: Option<Level>,
    pub tags: BTreeMap<String, String>,
}

impl Default for SubscriptionSpec {
    fn default() -> Self {
        SubscriptionSpec {
            source_glob: "*".to_string(),
            component_glob: "*".to_string(),
            level_floor: None,
            tags: BTreeMap::new(),
        }
    }
}

/// The compiled, cheap-to-evaluate form of a [`SubscriptionSpec`].
#[derive(Clone)]
pub struct CompiledFilter {
    source: GlobMatcher,
    component: GlobMatcher,
    level_floor: Option<Level>,
    tags: BTreeMap<String, String>,
}

impl CompiledFilter {
    pub fn compile(spec: &SubscriptionSpec) -> Result<CompiledFilter, FilterError> {
        let source = Glob::new(&spec.source_glob)
            .map_err(|e| FilterError::InvalidSourceGlob(spec.source_glob.clone(), e.to_string()))?
            .compile_matcher();
        let component = Glob::new(&spec.component_glob)
            .map_err(|e| FilterError::InvalidComponentGlob(spec.component_glob.clone(), e.to_string()))?
            .compile_matcher();
        Ok(CompiledFilter {
            source,
            component,
            level_floor: spec.level_floor,
            tags: spec.tags.clone(),
        })
    }

    pub fn matches_entry(&self, entry: &Entry) -> bool {
        if !self.source.is_match(&entry.source) || !self.component.is_match(&entry.component) {
            return false;
        }
        if let Some(floor) = self.level_floor {
            match &entry.kind {
                EntryKind::Log { level, .. } => {
                    if !level.floor_matches(floor) {
                        return false;
                    }
                }
                EntryKind::Metric { .. } => {}
            }
        }
        self.tags_match(&entry.tags)
    }

    pub fn matches_alert(&self, alert: &Alert) -> bool {
        if let Some(floor) = self.level_floor {
            if alert.level < floor_as_alert_level(floor) {
                return false;
            }
        }
        true
    }

    fn tags_match(&self, tags: &BTreeMap<String, String>) -> bool {
        self.tags.iter().all(|(k, v)| tags.get(k) == Some(v))
    }
}

/// Coarse mapping used only to compare an Alert's severity against a
/// subscription's log-level floor (Alerts carry `AlertLevel`, not `Level`).
fn floor_as_alert_level(floor: Level) -> signalhub_core::AlertLevel {
    use signalhub_core::AlertLevel;
    match floor {
        Level::Trace | Level::Debug | Level::Info => AlertLevel::Info,
        Level::Warn => AlertLevel::Warning,
        Level::Error => AlertLevel::Critical,
        Level::Fatal => AlertLevel::Emergency,
        Level::Unknown => AlertLevel::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap as Map;

    fn entry(source: &str, component: &str, level: Level) -> Entry {
        Entry::new_log(Utc::now(), source, component, level, "hi", Map::new(), None, None).unwrap()
    }

    #[test]
    fn default_spec_matches_everything() {
        let filter = CompiledFilter::compile(&SubscriptionSpec::default()).unwrap();
        assert!(filter.matches_entry(&entry("app", "api", Level::Info)));
    }

    #[test]
    fn source_glob_restricts_to_matching_sources() {
        let spec = SubscriptionSpec {
            source_glob: "database.*".to_string(),
            ..Default::default()
        };
        let filter = CompiledFilter::compile(&spec).unwrap();
        assert!(filter.matches_entry(&entry("database.redis", "primary", Level::Info)));
        assert!(!filter.matches_entry(&entry("application", "api", Level::Info)));
    }

    #[test]
    fn level_floor_excludes_lower_severities() {
        let spec = SubscriptionSpec {
            level_floor: Some(Level::Warn),
            ..Default::default()
        };
        let filter = CompiledFilter::compile(&spec).unwrap();
        assert!(!filter.matches_entry(&entry("app", "api", Level::Info)));
        assert!(filter.matches_entry(&entry("app", "api", Level::Error)));
    }

    #[test]
    fn invalid_glob_is_rejected_at_compile_time() {
        let spec = SubscriptionSpec {
            source_glob: "[".to_string(),
            ..Default::default()
        };
        assert!(matches!(CompiledFilter::compile(&spec), Err(FilterError::InvalidSourceGlob(_, _))));
    }
}
