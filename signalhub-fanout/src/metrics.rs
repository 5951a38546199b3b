//! Fanout Hub Prometheus metrics, registered through
//! [`signalhub_core::metrics_util`].

use std::sync::LazyLock;

use prometheus::{IntCounterVec, IntGaugeVec, Opts};
use signalhub_core::metrics_util::{register_int_counter_vec, register_int_gauge_vec};

pub static DELIVERED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        Opts::new("signalhub_fanout_delivered_total", "Frames delivered, by subscriber id"),
        &["subscriber_id"],
    )
});

pub static DROPPED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        Opts::new("signalhub_fanout_dropped_total", "Frames dropped due to a full subscriber queue"),
        &["subscriber_id"],
    )
});

pub static SUBSCRIBERS_ACTIVE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec(
        Opts::new("signalhub_fanout_subscribers_active", "Currently registered subscribers"),
        &["state"],
    )
});

pub static SUBSCRIBER_CLOSED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        Opts::new("signalhub_fanout_subscriber_closed_total", "Subscribers closed after consecutive drops"),
        &["reason"],
    )
});
