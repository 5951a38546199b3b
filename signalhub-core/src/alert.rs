use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of an [`Alert`] (spec §3.2). Declaration order is severity
/// order: `Info < Warning < Critical < Emergency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
    Emergency,
}

/// The literal `"kind": "alert"` discriminator spec §6.1 puts on the wire
/// shape, mirroring the tag `EntryKind` carries on `Entry` (entry.rs) so a
/// consumer reading the persisted/fanned-out stream can tell an `Alert`
/// from an `Entry` without inspecting any other field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Alert,
}

impl Default for AlertKind {
    fn default() -> Self {
        AlertKind::Alert
    }
}

/// Derived data emitted by the Analyzer: threshold crossings, anomalies,
/// recurring patterns, and correlation shifts all produce one of these
/// (spec §3.2). Alerts are persisted alongside entries and fanned out on a
/// dedicated channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub kind: AlertKind,
    pub id: Uuid,
    pub metric_or_event: String,
    pub level: AlertLevel,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub observed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub threshold: Option<f64>,
    pub reason: String,
    pub origin_entry_ids: Vec<Uuid>,
    pub timestamp: DateTime<Utc>,
    /// Dependent components affected via the cascade-context BFS (spec
    /// §4.G), annotated with an impact score of `1/depth`. Empty when no
    /// dependency map was supplied or the component has no dependents.
    #[serde(default)]
    pub cascade: Vec<CascadeImpact>,
}

/// One entry in an [`Alert`]'s cascade annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeImpact {
    pub component: String,
    pub depth: u32,
    pub impact_score: f64,
}

impl Alert {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        metric_or_event: impl Into<String>,
        level: AlertLevel,
        observed: Option<f64>,
        threshold: Option<f64>,
        reason: impl Into<String>,
        origin_entry_ids: Vec<Uuid>,
        timestamp: DateTime<Utc>,
    ) -> Alert {
        Alert {
            kind: AlertKind::Alert,
            id: Uuid::now_v7(),
            metric_or_event: metric_or_event.into(),
            level,
            observed,
            threshold,
            reason: reason.into(),
            origin_entry_ids,
            timestamp,
            cascade: Vec::new(),
        }
    }

    pub fn with_cascade(mut self, cascade: Vec<CascadeImpact>) -> Alert {
        self.cascade = cascade;
        self
    }
}

/// An in-place revision to a previously emitted [`Alert`] (spec Glossary,
/// Cool-down: "no new alert emitted ... the existing alert's `observed` and
/// `timestamp` update instead"). Carries only what changes; the stored
/// alert's `id`, `reason`, and everything else are untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertObservationUpdate {
    pub id: Uuid,
    pub observed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// What the Analyzer hands downstream for one triggering signal: either a
/// brand new [`Alert`] or a revision to one already persisted under cool-down
/// suppression. Keeping both in one enum means the Store/Fanout sink can
/// apply either without the Analyzer having to reach into storage itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum AlertEvent {
    New(Alert),
    Updated(AlertObservationUpdate),
}

impl AlertEvent {
    pub fn level(&self) -> Option<AlertLevel> {
        match self {
            AlertEvent::New(alert) => Some(alert.level),
            AlertEvent::Updated(_) => None,
        }
    }
}
