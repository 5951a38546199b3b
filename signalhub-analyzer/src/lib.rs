//! # signalhub-analyzer
//!
//! The Analyzer (spec §4.G): stateful derived-signal detection over the
//! normalized Entry stream — adaptive thresholds, anomaly detection via
//! z-score, recurring-pattern tracking, cross-series correlation shifts,
//! and cascade-context annotation. Runs as a pure consumer/producer task
//! (spec §9): it consumes Entries and produces Alerts onto a queue, with no
//! direct reference to the Store or Fanout Hub.

mod cascade;
mod config;
mod correlation;
mod engine;
mod metrics;
mod pattern;
mod runner;
mod stats;
mod threshold;
mod window;

pub use cascade::{DependencyMap, DependencyMapError};
pub use config::{AnalyzerConfig, SeriesBaseline};
pub use correlation::{CorrelationShift, CorrelationTracker};
pub use engine::Analyzer;
pub use pattern::{normalize_message, PatternSignal, PatternTracker};
pub use runner::AnalyzerHandle;
pub use signalhub_core::AlertLevel;
pub use stats::WelfordStats;
pub use threshold::{ThresholdCrossing, ThresholdRecord};
pub use window::SlidingWindow;
