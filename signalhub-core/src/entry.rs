use std::collections::BTreeMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};
use crate::level::Level;

/// Informational hint on the shape of a metric sample (`MetricValue.
/// metric_type` in the original `real_time_metrics_collector.py`). Carried
/// verbatim; it does not change any ingestion invariant (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Timing,
}

/// The closed sum of entry payloads. Modeled as a single enum (rather than a
/// class hierarchy with per-field existence checks) so `kind=log ⇒ message
/// present` and `kind=metric ⇒ metric_name and value present` are enforced
/// by the type system instead of at runtime (spec §9, "dynamic-typed entry
/// payloads").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryKind {
    Log {
        level: Level,
        message: String,
    },
    Metric {
        metric_name: String,
        value: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        metric_type: Option<MetricType>,
    },
}

impl EntryKind {
    pub fn is_log(&self) -> bool {
        matches!(self, EntryKind::Log { .. })
    }

    pub fn is_metric(&self) -> bool {
        matches!(self, EntryKind::Metric { .. })
    }

    pub fn level(&self) -> Option<Level> {
        match self {
            EntryKind::Log { level, .. } => Some(*level),
            EntryKind::Metric { .. } => None,
        }
    }
}

/// The normalized shape every log or metric takes once inside the system
/// (spec §3.1). An `Entry` is immutable once persisted; the only stage that
/// may touch it after construction is the Enricher, which adds tags but
/// never mutates producer-supplied fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Assigned on ingest; never supplied by the producer, never reused.
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub component: String,
    #[serde(flatten)]
    pub kind: EntryKind,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub raw: Option<String>,
}

impl Entry {
    /// Constructs a log entry, assigning a fresh id. `timestamp` is the
    /// producer-supplied instant if any; the caller stamps ingest time
    /// before calling when the producer did not supply one.
    #[allow(clippy::too_many_arguments)]
    pub fn new_log(
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
        component: impl Into<String>,
        level: Level,
        message: impl Into<String>,
        tags: BTreeMap<String, String>,
        correlation_id: Option<String>,
        raw: Option<String>,
    ) -> ValidationResult<Entry> {
        let source = source.into();
        let component = component.into();
        if source.is_empty() {
            return Err(ValidationError::EmptySource);
        }
        if component.is_empty() {
            return Err(ValidationError::EmptyComponent);
        }
        if tags.keys().any(|k| k.is_empty()) {
            return Err(ValidationError::EmptyTagKey);
        }
        Ok(Entry {
            id: Uuid::now_v7(),
            timestamp,
            source,
            component,
            kind: EntryKind::Log {
                level,
                message: message.into(),
            },
            tags,
            correlation_id,
            raw,
        })
    }

    /// Constructs a metric entry, assigning a fresh id.
    #[allow(clippy::too_many_arguments)]
    pub fn new_metric(
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
        component: impl Into<String>,
        metric_name: impl Into<String>,
        value: f64,
        unit: Option<String>,
        tags: BTreeMap<String, String>,
    ) -> ValidationResult<Entry> {
        let source = source.into();
        let component = component.into();
        let metric_name = metric_name.into();
        if source.is_empty() {
            return Err(ValidationError::EmptySource);
        }
        if component.is_empty() {
            return Err(ValidationError::EmptyComponent);
        }
        if metric_name.is_empty() {
            return Err(ValidationError::EmptyMetricName);
        }
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteValue(value));
        }
        if tags.keys().any(|k| k.is_empty()) {
            return Err(ValidationError::EmptyTagKey);
        }
        Ok(Entry {
            id: Uuid::now_v7(),
            timestamp,
            source,
            component,
            kind: EntryKind::Metric {
                metric_name,
                value,
                unit,
                metric_type: None,
            },
            tags,
            correlation_id: None,
            raw: None,
        })
    }

    /// Attaches the optional `metric_type` hint (counter | gauge | histogram
    /// | summary | timing, SPEC_FULL.md §3). A no-op on log entries.
    pub fn with_metric_type(mut self, metric_type: MetricType) -> Entry {
        if let EntryKind::Metric { metric_type: slot, .. } = &mut self.kind {
            *slot = Some(metric_type);
        }
        self
    }

    pub fn metric_type(&self) -> Option<MetricType> {
        match &self.kind {
            EntryKind::Metric { metric_type, .. } => *metric_type,
            EntryKind::Log { .. } => None,
        }
    }

    /// The series key used by the analyzer's sliding windows (spec §3.3,
    /// glossary "Series key"): `(metric_name, component)` for metrics,
    /// `(source, component)` for logs.
    pub fn series_key(&self) -> (String, String) {
        match &self.kind {
            EntryKind::Metric { metric_name, .. } => (metric_name.clone(), self.component.clone()),
            EntryKind::Log { .. } => (self.source.clone(), self.component.clone()),
        }
    }
}

/// Rejects timestamps more than `tolerance` ahead of `now` (spec §3.1). This
/// is a system-wide ingestion policy, not a structural property of `Entry`
/// itself, so it is a free function applied at the ingestion boundary
/// (Enricher/Bus) rather than inside the builders above.
pub fn check_timestamp_skew(
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    tolerance: ChronoDuration,
) -> ValidationResult<()> {
    let skew = timestamp - now;
    if skew > tolerance {
        return Err(ValidationError::TimestampTooFarInFuture {
            timestamp,
            skew_ms: skew.num_milliseconds(),
            tolerance_ms: tolerance.num_milliseconds(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn new_log_requires_nonempty_source_and_component() {
        let now = Utc::now();
        assert_eq!(
            Entry::new_log(now, "", "api", Level::Info, "hi", tags(&[]), None, None).unwrap_err(),
            ValidationError::EmptySource
        );
        assert_eq!(
            Entry::new_log(now, "app", "", Level::Info, "hi", tags(&[]), None, None).unwrap_err(),
            ValidationError::EmptyComponent
        );
    }

    #[test]
    fn new_metric_rejects_non_finite_value() {
        let now = Utc::now();
        let err = Entry::new_metric(now, "system", "host-01", "cpu_percent", f64::NAN, None, tags(&[]))
            .unwrap_err();
        assert!(matches!(err, ValidationError::NonFiniteValue(_)));
    }

    #[test]
    fn ids_are_unique_across_constructions() {
        let now = Utc::now();
        let a = Entry::new_log(now, "app", "api", Level::Info, "a", tags(&[]), None, None).unwrap();
        let b = Entry::new_log(now, "app", "api", Level::Info, "b", tags(&[]), None, None).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn series_key_differs_by_kind() {
        let now = Utc::now();
        let log = Entry::new_log(now, "app", "api", Level::Info, "m", tags(&[]), None, None).unwrap();
        assert_eq!(log.series_key(), ("app".to_string(), "api".to_string()));

        let metric = Entry::new_metric(now, "system", "host-01", "cpu_percent", 1.0, None, tags(&[]))
            .unwrap();
        assert_eq!(
            metric.series_key(),
            ("cpu_percent".to_string(), "host-01".to_string())
        );
    }

    #[test]
    fn metric_type_is_none_by_default_and_absent_from_wire() {
        let now = Utc::now();
        let entry = Entry::new_metric(now, "system", "host-01", "cpu_percent", 1.0, None, tags(&[])).unwrap();
        assert_eq!(entry.metric_type(), None);
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("metric_type").is_none());
    }

    #[test]
    fn with_metric_type_sets_hint_and_round_trips() {
        let now = Utc::now();
        let entry = Entry::new_metric(now, "system", "host-01", "cpu_percent", 1.0, None, tags(&[]))
            .unwrap()
            .with_metric_type(MetricType::Gauge);
        assert_eq!(entry.metric_type(), Some(MetricType::Gauge));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["metric_type"], "gauge");
        let back: Entry = serde_json::from_value(value).unwrap();
        assert_eq!(back.metric_type(), Some(MetricType::Gauge));
    }

    #[test]
    fn with_metric_type_is_a_no_op_on_log_entries() {
        let now = Utc::now();
        let entry = Entry::new_log(now, "app", "api", Level::Info, "m", tags(&[]), None, None)
            .unwrap()
            .with_metric_type(MetricType::Counter);
        assert_eq!(entry.metric_type(), None);
    }

    #[test]
    fn skew_tolerance_accepts_boundary_and_rejects_beyond() {
        let now = Utc::now();
        let tolerance = ChronoDuration::seconds(5);
        assert!(check_timestamp_skew(now + ChronoDuration::seconds(5), now, tolerance).is_ok());
        assert!(check_timestamp_skew(now + ChronoDuration::seconds(6), now, tolerance).is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let now = Utc::now();
        let entry = Entry::new_log(
            now,
            "application",
            "api-gateway",
            Level::Error,
            "Database connection timeout",
            tags(&[("request_id", "abc123")]),
            Some("abc123".to_string()),
            None,
        )
        .unwrap();
        let json = serde_json::to_string(&entry).unwrap();
        let back: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
    }

    #[test]
    fn wire_format_matches_spec_shape() {
        let now = Utc::now();
        let entry = Entry::new_metric(now, "system", "host-01", "cpu_percent", 87.5, Some("percent".to_string()), tags(&[("core", "0")])).unwrap();
        let value: serde_json::Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["kind"], "metric");
        assert_eq!(value["metric_name"], "cpu_percent");
        assert_eq!(value["value"], 87.5);
        assert_eq!(value["unit"], "percent");
    }
}
