//! Analyzer tuning parameters (spec §4.G, §9 "Cool-down values, sliding-
//! window sizes, and learning-rate defaults ... the specification's
//! defaults in §4 are canonical; they MAY be overridden only via
//! configuration").

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Sliding window size bound (spec §3.3).
    pub window_max_samples: usize,
    /// Sliding window time bound (spec §3.3).
    pub window_max_age: Duration,
    /// Anomaly z-score threshold `S` (spec §4.G item 3).
    pub anomaly_z_threshold: f64,
    /// Minimum window size before anomaly checks apply.
    pub anomaly_min_samples: u64,
    /// Cool-down after an anomaly alert before an equivalent one re-fires;
    /// mirrors `pattern_cooldown`'s suppression (spec Glossary, Cool-down).
    pub anomaly_cooldown: Duration,
    /// Learning rate `α` for adaptive threshold blending.
    pub threshold_learning_rate: f64,
    /// Blend the adaptive threshold every `E` samples of that series.
    pub threshold_update_every: u32,
    /// Minimum recurrence count `K` before a "recurring error" alert fires.
    pub pattern_recurrence_threshold: u64,
    /// Window within which recurrences are counted toward `K`.
    pub pattern_recurrence_window: Duration,
    /// Cool-down after a pattern alert before an equivalent one re-fires.
    pub pattern_cooldown: Duration,
    /// Minimum overlapping samples before a correlation is considered.
    pub correlation_min_overlap: u64,
    /// `|r|` magnitude threshold for a correlation-shift alert.
    pub correlation_threshold: f64,
    /// Queue depth at which the analyzer begins load-shedding by sampling
    /// (spec §5: "keeping one in K entries for statistics only").
    pub high_water_mark: usize,
    pub sampling_k: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            window_max_samples: 1000,
            window_max_age: Duration::from_secs(15 * 60),
            anomaly_z_threshold: 2.0,
            anomaly_min_samples: 10,
            anomaly_cooldown: Duration::from_secs(5 * 60),
            threshold_learning_rate: 0.1,
            threshold_update_every: 10,
            pattern_recurrence_threshold: 3,
            pattern_recurrence_window: Duration::from_secs(10 * 60),
            pattern_cooldown: Duration::from_secs(5 * 60),
            correlation_min_overlap: 30,
            correlation_threshold: 0.7,
            high_water_mark: 10_000,
            sampling_k: 10,
        }
    }
}

/// Configured base warning/critical pair for one series key, read from
/// static configuration (spec §3.4 "from configuration").
#[derive(Debug, Clone, Copy)]
pub struct SeriesBaseline {
    pub base_warning: f64,
    pub base_critical: f64,
}
