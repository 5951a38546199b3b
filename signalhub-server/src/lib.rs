//! The Server component (spec §4.I): a JSON-RPC request/response surface, a
//! WebSocket push stream, and the ambient `/metrics` and `/health` endpoints,
//! all sharing one [`AppState`]. Grounded in `dashflow-observability`'s
//! `metrics_server`/`websocket_server` pair, merged onto a single axum
//! `Router` the way the teacher's single-binary deployments do.

mod error;
mod idempotency;
mod metrics;
mod rpc;
mod state;
mod websocket;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ServerError;
pub use idempotency::IdempotencyCache;
pub use metrics::{gather_counter_sum, health_handler, metrics_handler};
pub use rpc::{handle_request, RpcRequest, RpcResponse};
pub use state::AppState;
pub use websocket::websocket_handler;

/// `POST /rpc`: parses one [`RpcRequest`] and dispatches it through
/// [`handle_request`]. Always answers `200` with a JSON-RPC envelope (spec
/// §7) — HTTP status is not overloaded to carry RPC-level errors.
async fn rpc_handler(State(state): State<AppState>, Json(request): Json<RpcRequest>) -> impl IntoResponse {
    Json(handle_request(&state, request).await)
}

/// Builds the full router: `/rpc`, `/ws`, `/metrics`, `/health`, all bound
/// to one [`AppState`]. The caller owns binding and serving (spec §6.5's
/// `--host`/`--port`), matching `dashflow-observability::metrics_server`'s
/// split between router construction and `axum::serve`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rpc", post(rpc_handler))
        .route("/ws", get(websocket_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use signalhub_fanout::FanoutHub;
    use signalhub_ingest::IngestionBus;
    use signalhub_parsers::ParserRegistry;
    use signalhub_store::MemoryStore;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(
            Arc::new(MemoryStore::new()),
            IngestionBus::new(Default::default()),
            Arc::new(FanoutHub::new()),
            Arc::new(ParserRegistry::with_builtins()),
        )
    }

    #[tokio::test]
    async fn health_reports_ok_before_draining() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_service_unavailable_while_draining() {
        let state = test_state();
        state.begin_draining();
        let app = router(state);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_text_exposition() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rpc_endpoint_rejects_new_work_while_draining() {
        let state = test_state();
        state.begin_draining();
        let app = router(state);
        let body = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "stats", "params": {}});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rpc")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value.get("error").is_some());
    }
}
