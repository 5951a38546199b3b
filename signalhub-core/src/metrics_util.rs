//! Shared helpers for registering Prometheus metrics against the process's
//! default registry. Every crate defines its own `LazyLock`-held metrics
//! (spec ambient requirement: `/metrics` exposition), but registration
//! against `prometheus::default_registry()` is centralized here so a metric
//! re-registered across test runs (or across two collectors in the same
//! process) degrades to a warning instead of a panic, following
//! `dashflow-streaming::metrics_utils`'s tolerance for `Error::AlreadyReg`.

use prometheus::{IntCounterVec, IntGaugeVec, Opts};
use tracing::warn;

pub fn register_int_counter_vec(opts: Opts, labels: &[&str]) -> IntCounterVec {
    let name = opts.name.clone();
    let metric = IntCounterVec::new(opts, labels).expect("valid counter vec options");
    if let Err(e) = prometheus::default_registry().register(Box::new(metric.clone())) {
        if !matches!(e, prometheus::Error::AlreadyReg) {
            warn!(metric = %name, error = %e, "counter registration failed");
        }
    }
    metric
}

pub fn register_int_gauge_vec(opts: Opts, labels: &[&str]) -> IntGaugeVec {
    let name = opts.name.clone();
    let metric = IntGaugeVec::new(opts, labels).expect("valid gauge vec options");
    if let Err(e) = prometheus::default_registry().register(Box::new(metric.clone())) {
        if !matches!(e, prometheus::Error::AlreadyReg) {
            warn!(metric = %name, error = %e, "gauge registration failed");
        }
    }
    metric
}
