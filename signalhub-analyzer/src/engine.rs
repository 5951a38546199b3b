//! The Analyzer core (spec §4.G): a pure consumer/producer — it consumes
//! Entries and produces Alerts, with no direct reference to the Store or
//! Fanout Hub (spec §9, "break cycles by making the Analyzer a pure
//! consumer/producer").

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use signalhub_core::{Alert, AlertEvent, AlertLevel, AlertObservationUpdate, Entry, EntryKind, Level};
use uuid::Uuid;

use crate::cascade::DependencyMap;
use crate::config::{AnalyzerConfig, SeriesBaseline};
use crate::correlation::CorrelationTracker;
use crate::pattern::{PatternSignal, PatternTracker};
use crate::threshold::ThresholdRecord;
use crate::window::SlidingWindow;

type SeriesKey = (String, String);

fn series_key_str(key: &SeriesKey) -> String {
    format!("{}::{}", key.0, key.1)
}

/// Level above which a log entry itself crosses the (non-adaptive) log
/// alert floor (spec §4.G item 2, "compare level against threshold" —
/// resolved here as a configurable severity floor rather than a numeric
/// adaptive value, since logs carry no magnitude to blend against; see
/// DESIGN.md).
const DEFAULT_LOG_ALERT_FLOOR: Level = Level::Error;

/// Cool-down bookkeeping for one series' anomaly alerts, the metric
/// counterpart to [`crate::pattern::PatternEntry`]'s recurring-alert
/// tracking.
struct AnomalyState {
    last_alert_at: DateTime<Utc>,
    last_alert_id: Uuid,
}

pub struct Analyzer {
    config: AnalyzerConfig,
    windows: HashMap<SeriesKey, SlidingWindow>,
    thresholds: HashMap<SeriesKey, ThresholdRecord>,
    baselines: HashMap<SeriesKey, SeriesBaseline>,
    pattern_tracker: PatternTracker,
    correlation_tracker: CorrelationTracker,
    cascade: DependencyMap,
    log_alert_floor: Level,
    entries_seen: u64,
    anomaly_state: HashMap<SeriesKey, AnomalyState>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig, baselines: HashMap<SeriesKey, SeriesBaseline>) -> Analyzer {
        let pattern_tracker = PatternTracker::new(
            config.pattern_recurrence_threshold,
            config.pattern_recurrence_window,
            config.pattern_cooldown,
        );
        let correlation_tracker =
            CorrelationTracker::new(config.correlation_min_overlap, config.correlation_threshold);
        Analyzer {
            config,
            windows: HashMap::new(),
            thresholds: HashMap::new(),
            baselines,
            pattern_tracker,
            correlation_tracker,
            cascade: DependencyMap::empty(),
            log_alert_floor: DEFAULT_LOG_ALERT_FLOOR,
            entries_seen: 0,
            anomaly_state: HashMap::new(),
        }
    }

    pub fn with_cascade_map(mut self, cascade: DependencyMap) -> Analyzer {
        self.cascade = cascade;
        self
    }

    /// Swaps in a freshly loaded dependency map (spec §6.7: reloaded on
    /// `SIGHUP`, absence is not an error). Takes effect on the next Entry.
    pub fn set_cascade_map(&mut self, cascade: DependencyMap) {
        self.cascade = cascade;
    }

    /// Processes one Entry, returning zero or more Alerts. `queue_depth` is
    /// the current Ingestion-to-Analyzer queue occupancy, used to decide
    /// whether pattern/correlation bookkeeping should be shed under load
    /// (spec §5: "alerts are never sampled ... pattern/correlation updates
    /// may be skipped").
    pub fn process_entry(&mut self, entry: &Entry, queue_depth: usize) -> Vec<AlertEvent> {
        self.entries_seen += 1;
        let shed_bookkeeping =
            queue_depth > self.config.high_water_mark && self.entries_seen % self.config.sampling_k as u64 != 0;

        let mut events = match &entry.kind {
            EntryKind::Metric { metric_name, value, .. } => {
                self.process_metric(entry, metric_name, *value, shed_bookkeeping)
            }
            EntryKind::Log { level, message } => self.process_log(entry, *level, message, shed_bookkeeping),
        };

        for event in &mut events {
            if let AlertEvent::New(alert) = event {
                let cascade = self.cascade.affected(&entry.component);
                if !cascade.is_empty() {
                    alert.cascade = cascade;
                }
            }
        }
        events
    }

    fn process_metric(
        &mut self,
        entry: &Entry,
        metric_name: &str,
        value: f64,
        shed_bookkeeping: bool,
    ) -> Vec<AlertEvent> {
        let key: SeriesKey = entry.series_key();
        let mut events = Vec::new();

        let window = self
            .windows
            .entry(key.clone())
            .or_insert_with(|| SlidingWindow::new(self.config.window_max_samples, self.config.window_max_age));
        window.push(entry.timestamp, value);
        let mean = window.stats().mean();
        let stddev = window.stats().stddev();
        let sample_count = window.stats().count();

        if let Some(baseline) = self.baselines.get(&key) {
            let record = self.thresholds.entry(key.clone()).or_insert_with(|| {
                ThresholdRecord::new(
                    baseline.base_warning,
                    baseline.base_critical,
                    self.config.threshold_learning_rate,
                    self.config.threshold_update_every,
                )
            });
            record.observe(mean, stddev);
            if let Some(crossing) = record.crossing(value) {
                events.push(AlertEvent::New(Alert::new(
                    metric_name,
                    crossing.level,
                    Some(value),
                    Some(crossing.threshold),
                    "threshold_exceeded",
                    vec![entry.id],
                    entry.timestamp,
                )));
            }
        }

        if sample_count >= self.config.anomaly_min_samples {
            let z = window.stats().z_score(value);
            if z > self.config.anomaly_z_threshold {
                let cooldown =
                    chrono::Duration::from_std(self.config.anomaly_cooldown).unwrap_or(chrono::Duration::minutes(5));
                let suppressed = self
                    .anomaly_state
                    .get(&key)
                    .is_some_and(|state| entry.timestamp - state.last_alert_at < cooldown);

                if suppressed {
                    let state = self.anomaly_state.get_mut(&key).expect("checked by is_some_and above");
                    state.last_alert_at = entry.timestamp;
                    events.push(AlertEvent::Updated(AlertObservationUpdate {
                        id: state.last_alert_id,
                        observed: Some(value),
                        timestamp: entry.timestamp,
                    }));
                } else {
                    let alert = Alert::new(
                        metric_name,
                        AlertLevel::Warning,
                        Some(value),
                        Some(self.config.anomaly_z_threshold),
                        format!("anomaly: z-score {z:.2} exceeds threshold {:.2}", self.config.anomaly_z_threshold),
                        vec![entry.id],
                        entry.timestamp,
                    );
                    self.anomaly_state.insert(
                        key.clone(),
                        AnomalyState {
                            last_alert_at: entry.timestamp,
                            last_alert_id: alert.id,
                        },
                    );
                    events.push(AlertEvent::New(alert));
                }
            }
        }

        if !shed_bookkeeping {
            let series_key_str = series_key_str(&key);
            for (other, shift) in self.correlation_tracker.observe(&series_key_str, value) {
                events.push(AlertEvent::New(Alert::new(
                    format!("{}~{}", series_key_str, other),
                    AlertLevel::Info,
                    Some(shift.r),
                    Some(self.config.correlation_threshold),
                    format!("correlation_shift: r={:.2} between {series_key_str} and {other}", shift.r),
                    vec![entry.id],
                    entry.timestamp,
                )));
            }
        }

        events
    }

    fn process_log(&mut self, entry: &Entry, level: Level, message: &str, shed_bookkeeping: bool) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        if level.floor_matches(self.log_alert_floor) {
            events.push(AlertEvent::New(Alert::new(
                entry.source.clone(),
                level_to_alert_level(level),
                None,
                None,
                format!("log level {level} crossed alert floor {}", self.log_alert_floor),
                vec![entry.id],
                entry.timestamp,
            )));
        }

        if !shed_bookkeeping {
            let (pattern_key, signal) = self.pattern_tracker.observe(message, level, entry.timestamp);
            match signal {
                Some(PatternSignal::NewPattern) => {
                    events.push(AlertEvent::New(Alert::new(
                        entry.source.clone(),
                        AlertLevel::Warning,
                        None,
                        None,
                        "new_pattern",
                        vec![entry.id],
                        entry.timestamp,
                    )));
                }
                Some(PatternSignal::Recurring { count }) => {
                    let alert = Alert::new(
                        entry.source.clone(),
                        AlertLevel::Warning,
                        Some(count as f64),
                        Some(self.config.pattern_recurrence_threshold as f64),
                        "recurring_error",
                        vec![entry.id],
                        entry.timestamp,
                    );
                    self.pattern_tracker.record_alert_id(&pattern_key, alert.id);
                    events.push(AlertEvent::New(alert));
                }
                Some(PatternSignal::RecurringUpdate { alert_id, count }) => {
                    events.push(AlertEvent::Updated(AlertObservationUpdate {
                        id: alert_id,
                        observed: Some(count as f64),
                        timestamp: entry.timestamp,
                    }));
                }
                None => {}
            }
        }

        events
    }
}

fn level_to_alert_level(level: Level) -> AlertLevel {
    match level {
        Level::Fatal => AlertLevel::Emergency,
        Level::Error => AlertLevel::Critical,
        Level::Warn => AlertLevel::Warning,
        _ => AlertLevel::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn metric(name: &str, component: &str, value: f64, at: chrono::DateTime<Utc>) -> Entry {
        Entry::new_metric(at, "system", component, name, value, None, BTreeMap::new()).unwrap()
    }

    fn log(component: &str, level: Level, message: &str, at: chrono::DateTime<Utc>) -> Entry {
        Entry::new_log(at, "application", component, level, message, BTreeMap::new(), None, None).unwrap()
    }

    /// Most tests only care about freshly emitted alerts, not cool-down
    /// revisions to earlier ones.
    fn new_alerts(events: &[AlertEvent]) -> Vec<&Alert> {
        events
            .iter()
            .filter_map(|e| match e {
                AlertEvent::New(alert) => Some(alert),
                AlertEvent::Updated(_) => None,
            })
            .collect()
    }

    #[test]
    fn threshold_crossing_emits_critical_alert() {
        let mut baselines = HashMap::new();
        baselines.insert(
            ("cpu_percent".to_string(), "host-01".to_string()),
            SeriesBaseline { base_warning: 70.0, base_critical: 90.0 },
        );
        let mut analyzer = Analyzer::new(AnalyzerConfig::default(), baselines);

        let now = Utc::now();
        for i in 0..20 {
            let _ = analyzer.process_entry(&metric("cpu_percent", "host-01", 65.0 + i as f64 % 4.0, now), 0);
        }
        let events = analyzer.process_entry(&metric("cpu_percent", "host-01", 95.0, now), 0);
        let alerts = new_alerts(&events);
        assert!(alerts.iter().any(|a| a.level == AlertLevel::Critical && a.reason == "threshold_exceeded"));
    }

    #[test]
    fn anomaly_detected_after_min_samples() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default(), HashMap::new());
        let now = Utc::now();
        for _ in 0..50 {
            let _ = analyzer.process_entry(&metric("response_time", "api", 100.0, now), 0);
        }
        let events = analyzer.process_entry(&metric("response_time", "api", 500.0, now), 0);
        let alerts = new_alerts(&events);
        assert!(alerts.iter().any(|a| a.reason.contains("anomaly")));
    }

    #[test]
    fn repeated_anomaly_within_cooldown_updates_instead_of_reemitting() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default(), HashMap::new());
        let now = Utc::now();
        for _ in 0..50 {
            let _ = analyzer.process_entry(&metric("response_time", "api", 100.0, now), 0);
        }
        let first = analyzer.process_entry(&metric("response_time", "api", 500.0, now), 0);
        let first_alert = new_alerts(&first)
            .into_iter()
            .find(|a| a.reason.contains("anomaly"))
            .expect("first anomaly should emit a new alert")
            .clone();

        let second = analyzer.process_entry(
            &metric("response_time", "api", 600.0, now + chrono::Duration::seconds(1)),
            0,
        );
        assert!(
            new_alerts(&second).iter().all(|a| !a.reason.contains("anomaly")),
            "cool-down should suppress a second brand-new anomaly alert"
        );
        let update = second
            .iter()
            .find_map(|e| match e {
                AlertEvent::Updated(u) => Some(u),
                AlertEvent::New(_) => None,
            })
            .expect("cool-down should instead update the existing anomaly alert");
        assert_eq!(update.id, first_alert.id);
        assert_eq!(update.observed, Some(600.0));
    }

    #[test]
    fn error_log_crosses_alert_floor() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default(), HashMap::new());
        let now = Utc::now();
        let events = analyzer.process_entry(&log("api", Level::Error, "boom", now), 0);
        let alerts = new_alerts(&events);
        assert!(alerts.iter().any(|a| a.level == AlertLevel::Critical));
    }

    #[test]
    fn info_log_never_crosses_alert_floor() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default(), HashMap::new());
        let now = Utc::now();
        let events = analyzer.process_entry(&log("api", Level::Info, "all good", now), 0);
        assert!(events.is_empty());
    }

    #[test]
    fn pattern_recurrence_flows_through_to_alerts() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default(), HashMap::new());
        let now = Utc::now();
        let first = analyzer.process_entry(&log("api", Level::Error, "Timeout after 12ms", now), 0);
        assert!(new_alerts(&first).iter().any(|a| a.reason == "new_pattern"));

        let _ = analyzer.process_entry(&log("api", Level::Error, "Timeout after 47ms", now), 0);
        let third = analyzer.process_entry(&log("api", Level::Error, "Timeout after 99ms", now), 0);
        assert!(new_alerts(&third).iter().any(|a| a.reason == "recurring_error"));
    }

    #[test]
    fn cooldown_suppressed_recurrence_updates_the_existing_alert() {
        let mut analyzer = Analyzer::new(AnalyzerConfig::default(), HashMap::new());
        let now = Utc::now();
        let _ = analyzer.process_entry(&log("api", Level::Error, "Timeout after 12ms", now), 0);
        let _ = analyzer.process_entry(&log("api", Level::Error, "Timeout after 47ms", now), 0);
        let third = analyzer.process_entry(&log("api", Level::Error, "Timeout after 99ms", now), 0);
        let recurring_id = new_alerts(&third)
            .into_iter()
            .find(|a| a.reason == "recurring_error")
            .expect("third occurrence should emit a recurring_error alert")
            .id;

        let fourth = analyzer.process_entry(
            &log("api", Level::Error, "Timeout after 1ms", now + chrono::Duration::seconds(1)),
            0,
        );
        assert!(
            new_alerts(&fourth).iter().all(|a| a.reason != "recurring_error"),
            "cool-down should suppress a second brand-new recurring alert"
        );
        let update = fourth
            .iter()
            .find_map(|e| match e {
                AlertEvent::Updated(u) => Some(u),
                AlertEvent::New(_) => None,
            })
            .expect("cool-down should instead update the existing recurring alert");
        assert_eq!(update.id, recurring_id);
    }

    #[test]
    fn sampling_under_load_still_checks_threshold_every_entry() {
        let mut baselines = HashMap::new();
        baselines.insert(
            ("cpu_percent".to_string(), "host-01".to_string()),
            SeriesBaseline { base_warning: 70.0, base_critical: 90.0 },
        );
        let mut config = AnalyzerConfig::default();
        config.high_water_mark = 1;
        let mut analyzer = Analyzer::new(config, baselines);

        let now = Utc::now();
        for i in 0..20 {
            let _ = analyzer.process_entry(&metric("cpu_percent", "host-01", 65.0 + i as f64 % 4.0, now), 100);
        }
        let events = analyzer.process_entry(&metric("cpu_percent", "host-01", 95.0, now), 100);
        assert!(new_alerts(&events).iter().any(|a| a.reason == "threshold_exceeded"));
    }
}
