//! Bus-wide Prometheus counters, registered through
//! [`signalhub_core::metrics_util`] the way `dashflow-streaming::rate_limiter`
//! wraps a bounded resource with observable counters.

use std::sync::LazyLock;

use prometheus::{IntCounterVec, IntGaugeVec, Opts};
use signalhub_core::metrics_util::{register_int_counter_vec, register_int_gauge_vec};

pub static BUS_ACCEPTED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        Opts::new(
            "signalhub_bus_accepted_total",
            "Entries accepted onto the ingestion bus",
        ),
        &["bus"],
    )
});

pub static BUS_DROPPED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        Opts::new(
            "signalhub_bus_dropped_total",
            "Entries dropped by the ingestion bus overflow policy",
        ),
        &["bus", "reason"],
    )
});

pub static BUS_DEPTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec(
        Opts::new("signalhub_bus_depth", "Current ingestion bus queue depth"),
        &["bus"],
    )
});
