//! Collector-pool-wide Prometheus counters, registered through
//! [`signalhub_core::metrics_util`].

use std::sync::LazyLock;

use prometheus::{IntCounterVec, IntGaugeVec, Opts};
use signalhub_core::metrics_util::{register_int_counter_vec, register_int_gauge_vec};

pub static COLLECTOR_POLLS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        Opts::new("signalhub_collector_polls_total", "Collector poll attempts"),
        &["collector_id", "kind", "outcome"],
    )
});

pub static COLLECTOR_ENTRIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        Opts::new(
            "signalhub_collector_entries_total",
            "Entries produced by a collector across its polls",
        ),
        &["collector_id", "kind"],
    )
});

pub static COLLECTOR_STATE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec(
        Opts::new(
            "signalhub_collector_state",
            "1 if the collector is currently in the labeled state, else 0",
        ),
        &["collector_id", "state"],
    )
});
