//! Server-level Prometheus metrics plus the `/metrics` and `/health`
//! handlers, grounded in `dashflow-observability::metrics_server` (which
//! exposes the same two routes off the process's default registry).

use std::sync::LazyLock;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};
use signalhub_core::metrics_util::register_int_counter_vec;

use crate::state::AppState;

pub static RPC_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        Opts::new("signalhub_server_rpc_requests_total", "JSON-RPC requests handled, by method and outcome"),
        &["method", "outcome"],
    )
});

pub static WS_CONNECTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec(
        Opts::new("signalhub_server_ws_connections_total", "Push-stream connections accepted"),
        &["outcome"],
    )
});

/// `GET /metrics`: Prometheus text exposition of the process registry,
/// which every crate in the workspace registers its own metrics against.
pub async fn metrics_handler() -> Response {
    let families = prometheus::default_registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to encode metrics: {e}")).into_response();
    }
    (StatusCode::OK, buffer).into_response()
}

/// `GET /health`: liveness/readiness. Reports `503` while the server is
/// draining (spec §5 shutdown sequencing step 1: "stops accepting new
/// connections").
pub async fn health_handler(State(state): State<AppState>) -> Response {
    if state.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response()
    } else {
        (StatusCode::OK, "ok").into_response()
    }
}

/// Sums a counter vec's observed values across all label combinations, for
/// the `stats` RPC's coarse summary. Returns `0` if the metric hasn't been
/// registered yet (e.g. the analyzer hasn't processed its first entry).
pub fn gather_counter_sum(metric_name: &str) -> u64 {
    prometheus::default_registry()
        .gather()
        .into_iter()
        .find(|family| family.get_name() == metric_name)
        .map(|family| {
            family
                .get_metric()
                .iter()
                .map(|m| m.get_counter().get_value() as u64)
                .sum()
        })
        .unwrap_or(0)
}
