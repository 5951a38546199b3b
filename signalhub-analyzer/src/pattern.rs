//! Log pattern tracking (spec §4.G item 4): normalizes volatile tokens out
//! of a message to get a stable "pattern key", counts recurrences, and
//! emits alerts on first-sighting and on crossing a recurrence threshold,
//! with cool-down deduplication.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use signalhub_core::Level;
use uuid::Uuid;

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?").expect("valid regex")
});
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static IPV4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("valid regex"));
static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:/[\w.\-]+){2,}/?").expect("valid regex"));
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Replaces volatile tokens with placeholders, in an order where each
/// pattern's match is resolved before a looser one (digits last) could
/// otherwise eat part of it.
pub fn normalize_message(message: &str) -> String {
    let step = TIMESTAMP_RE.replace_all(message, "T");
    let step = URL_RE.replace_all(&step, "URL");
    let step = IPV4_RE.replace_all(&step, "IP");
    let step = PATH_RE.replace_all(&step, "PATH");
    DIGITS_RE.replace_all(&step, "N").into_owned()
}

struct PatternEntry {
    count: u64,
    last_level: Level,
    window_start: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    last_new_pattern_alert_at: Option<DateTime<Utc>>,
    last_recurring_alert_at: Option<DateTime<Utc>>,
    last_recurring_alert_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy)]
pub enum PatternSignal {
    NewPattern,
    Recurring { count: u64 },
    /// Cool-down suppressed a new recurring alert; the engine should revise
    /// the previously emitted alert (`alert_id`) in place rather than emit
    /// a new one (spec Glossary, Cool-down). `count` is the up-to-date
    /// occurrence count to write into that alert's `observed` field.
    RecurringUpdate { alert_id: Uuid, count: u64 },
}

pub struct PatternTracker {
    patterns: HashMap<String, PatternEntry>,
    recurrence_threshold: u64,
    recurrence_window: Duration,
    cooldown: Duration,
}

impl PatternTracker {
    pub fn new(recurrence_threshold: u64, recurrence_window: Duration, cooldown: Duration) -> PatternTracker {
        PatternTracker {
            patterns: HashMap::new(),
            recurrence_threshold,
            recurrence_window,
            cooldown,
        }
    }

    /// Records one occurrence of `message` at `level`/`at`, returning a
    /// signal if an alert should fire (cool-down permitting).
    pub fn observe(&mut self, message: &str, level: Level, at: DateTime<Utc>) -> (String, Option<PatternSignal>) {
        let key = normalize_message(message);
        let cooldown = chrono::Duration::from_std(self.cooldown).unwrap_or(chrono::Duration::minutes(5));
        let window = chrono::Duration::from_std(self.recurrence_window).unwrap_or(chrono::Duration::minutes(10));

        let entry = self.patterns.entry(key.clone()).or_insert_with(|| PatternEntry {
            count: 0,
            last_level: level,
            window_start: at,
            last_seen: at,
            last_new_pattern_alert_at: None,
            last_recurring_alert_at: None,
            last_recurring_alert_id: None,
        });

        let is_first_sighting = entry.count == 0;
        if at - entry.window_start > window {
            entry.window_start = at;
            entry.count = 0;
        }
        entry.count += 1;
        entry.last_level = level;
        entry.last_seen = at;

        if is_first_sighting {
            entry.last_new_pattern_alert_at = Some(at);
            return (key, Some(PatternSignal::NewPattern));
        }

        if level == Level::Error && entry.count >= self.recurrence_threshold {
            let suppressed = entry
                .last_recurring_alert_at
                .is_some_and(|last| at - last < cooldown);
            if suppressed {
                entry.last_recurring_alert_at = Some(at);
                let count = entry.count;
                return match entry.last_recurring_alert_id {
                    Some(alert_id) => (key, Some(PatternSignal::RecurringUpdate { alert_id, count })),
                    None => (key, None),
                };
            }
            entry.last_recurring_alert_at = Some(at);
            return (key, Some(PatternSignal::Recurring { count: entry.count }));
        }

        (key, None)
    }

    /// Called by the engine once it has persisted the real [`Alert`] for a
    /// `Recurring` signal, so a later cool-down-suppressed recurrence of the
    /// same pattern key knows which alert to revise instead of dropping the
    /// signal silently.
    pub fn record_alert_id(&mut self, key: &str, alert_id: Uuid) {
        if let Some(entry) = self.patterns.get_mut(key) {
            entry.last_recurring_alert_id = Some(alert_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_digits_timestamps_ips_urls_and_paths() {
        let msg = "2024-01-15T10:30:00Z request 42 from 10.0.0.5 to https://api.example.com/v1/users/99 via /var/log/app/7.log";
        let normalized = normalize_message(msg);
        assert_eq!(
            normalized,
            "T request N from IP to URL via PATH"
        );
    }

    #[test]
    fn first_sighting_emits_new_pattern_then_recurrence_emits_once() {
        let mut tracker = PatternTracker::new(3, Duration::from_secs(600), Duration::from_secs(300));
        let now = Utc::now();

        let (_, first) = tracker.observe("Timeout after 12ms", Level::Error, now);
        assert!(matches!(first, Some(PatternSignal::NewPattern)));

        let (_, second) = tracker.observe("Timeout after 47ms", Level::Error, now + chrono::Duration::seconds(1));
        assert!(second.is_none());

        let (_, third) = tracker.observe("Timeout after 99ms", Level::Error, now + chrono::Duration::seconds(2));
        assert!(matches!(third, Some(PatternSignal::Recurring { count: 3 })));

        // No alert id recorded yet (the engine only calls `record_alert_id`
        // after persisting the real alert), so the suppressed recurrence
        // has nothing to update and drops silently.
        let (_, fourth) = tracker.observe("Timeout after 1ms", Level::Error, now + chrono::Duration::seconds(3));
        assert!(fourth.is_none(), "cool-down should suppress the repeat alert");
    }

    #[test]
    fn cooldown_suppressed_recurrence_updates_the_recorded_alert_once_tracked() {
        let mut tracker = PatternTracker::new(3, Duration::from_secs(600), Duration::from_secs(300));
        let now = Utc::now();
        let alert_id = Uuid::now_v7();

        tracker.observe("Timeout after 12ms", Level::Error, now);
        tracker.observe("Timeout after 47ms", Level::Error, now + chrono::Duration::seconds(1));
        let (key, third) = tracker.observe("Timeout after 99ms", Level::Error, now + chrono::Duration::seconds(2));
        assert!(matches!(third, Some(PatternSignal::Recurring { count: 3 })));
        tracker.record_alert_id(&key, alert_id);

        let (_, fourth) = tracker.observe("Timeout after 1ms", Level::Error, now + chrono::Duration::seconds(3));
        match fourth {
            Some(PatternSignal::RecurringUpdate { alert_id: got, count }) => {
                assert_eq!(got, alert_id);
                assert_eq!(count, 4);
            }
            other => panic!("expected a RecurringUpdate signal, got {other:?}"),
        }
    }

    #[test]
    fn non_error_recurrence_never_emits_recurring_alert() {
        let mut tracker = PatternTracker::new(2, Duration::from_secs(600), Duration::from_secs(300));
        let now = Utc::now();
        tracker.observe("Request served in 12ms", Level::Info, now);
        let (_, signal) = tracker.observe("Request served in 99ms", Level::Info, now);
        assert!(signal.is_none());
    }
}
