//! Analyzer Prometheus metrics, registered through
//! [`signalhub_core::metrics_util`] (spec ambient requirement: `/metrics`
//! exposition), grounded in `dashflow-streaming::metrics_monitor`'s gauge
//! snapshot pattern for exposing derived, recomputed-on-read state.

use std::sync::LazyLock;

use prometheus::{IntCounterVec, Opts};
use signalhub_core::metrics_util::register_int_counter_vec;

pub static ENTRIES_ANALYZED_TOTAL_RAW: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        Opts::new("signalhub_analyzer_entries_total", "Entries processed by the analyzer"),
        &["stage"],
    )
});

/// Thin wrapper so call sites can write `ENTRIES_ANALYZED_TOTAL.inc()`
/// without repeating the single `"processed"` label everywhere.
pub struct EntriesAnalyzedCounter;

impl EntriesAnalyzedCounter {
    pub fn inc(&self) {
        ENTRIES_ANALYZED_TOTAL_RAW.with_label_values(&["processed"]).inc();
    }
}

pub static ENTRIES_ANALYZED_TOTAL: EntriesAnalyzedCounter = EntriesAnalyzedCounter;

pub static ALERTS_EMITTED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        Opts::new("signalhub_analyzer_alerts_emitted_total", "Alerts emitted by the analyzer, by level"),
        &["level"],
    )
});
