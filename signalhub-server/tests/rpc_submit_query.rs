//! Integration tests for the `submit`/`query` JSON-RPC surface (spec §6.2,
//! §8), driven through [`signalhub_server::handle_request`] the way a real
//! client would — one level up from `rpc.rs`'s inline unit tests, which
//! call the private per-method handlers directly. Grounded in
//! `dashflow-streaming`'s `mock_integration` tests: in-process, no external
//! services, one file per concern.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use signalhub_fanout::FanoutHub;
use signalhub_ingest::{BusConfig, IngestionBus};
use signalhub_parsers::ParserRegistry;
use signalhub_server::{handle_request, AppState, RpcRequest};
use signalhub_store::MemoryStore;

fn test_state() -> AppState {
    AppState::new(
        Arc::new(MemoryStore::new()),
        IngestionBus::new(BusConfig::default()),
        Arc::new(FanoutHub::new()),
        Arc::new(ParserRegistry::with_builtins()),
    )
}

fn rpc(method: &str, params: Value) -> RpcRequest {
    RpcRequest {
        jsonrpc: "2.0".to_string(),
        id: json!(1),
        method: method.to_string(),
        params,
    }
}

/// Drains the bus straight into the store, standing in for the
/// Enricher/Analyzer pipeline `signalhub-cli` wires in production; these
/// tests exercise the RPC surface and Store, not the analysis stages (see
/// `pipeline_scenarios.rs` for those).
async fn drain_bus_to_store(state: &AppState) {
    state.bus.close();
    while let Some(entry) = state.bus.recv().await {
        state.store.append(vec![entry]).await.unwrap();
    }
}

/// **S1 — Basic submit + query** (spec §8).
#[tokio::test]
async fn s1_basic_submit_and_query() {
    let state = test_state();
    let submit_params = json!({
        "entries": {
            "kind": "log",
            "source": "app",
            "component": "api",
            "level": "info",
            "message": "hello",
            "timestamp": "2024-01-15T10:00:00.000Z",
        }
    });
    let response = handle_request(&state, rpc("submit", submit_params)).await;
    let result = response.result.expect("submit should succeed");
    assert_eq!(result["rejected"].as_array().unwrap().len(), 0);
    assert_eq!(result["accepted"].as_array().unwrap().len(), 1);

    drain_bus_to_store(&state).await;

    let query_params = json!({
        "filter": { "sources": ["app"] },
        "time_range": ["2024-01-15T09:59:00Z", "2024-01-15T10:01:00Z"],
        "limit": 10,
    });
    let response = handle_request(&state, rpc("query", query_params)).await;
    let result = response.result.expect("query should succeed");
    let entries = result["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["source"], "app");
    assert_eq!(entries[0]["component"], "api");
    assert_eq!(entries[0]["level"], "info");
    assert_eq!(entries[0]["message"], "hello");
    assert!(entries[0]["id"].is_string());
}

/// Round-trip / idempotence: `submit` with the same `(client_id,
/// sequence)` returns the original ids without persisting a second time.
#[tokio::test]
async fn submit_is_idempotent_on_client_id_and_sequence() {
    let state = test_state();
    let params = json!({
        "client_id": "producer-a",
        "sequence": 7,
        "entries": {"kind": "log", "source": "app", "component": "api", "level": "info", "message": "hi"},
    });

    let first = handle_request(&state, rpc("submit", params.clone())).await.result.unwrap();
    let second = handle_request(&state, rpc("submit", params)).await.result.unwrap();
    assert_eq!(first["accepted"], second["accepted"]);

    drain_bus_to_store(&state).await;
    let result = handle_request(&state, rpc("query", json!({ "filter": { "sources": ["app"] } })))
        .await
        .result
        .unwrap();
    assert_eq!(result["entries"].as_array().unwrap().len(), 1, "second submit must not persist again");
}

/// Boundary behavior: timestamps at exactly `now + skew_tolerance` are
/// accepted; beyond are rejected with a `ValidationError` code.
#[tokio::test]
async fn timestamps_beyond_skew_tolerance_are_rejected() {
    let state = test_state();
    let too_far_ahead = Utc::now() + ChronoDuration::minutes(10);
    let params = json!({
        "entries": {
            "kind": "log",
            "source": "app",
            "component": "api",
            "level": "info",
            "message": "from the future",
            "timestamp": too_far_ahead.to_rfc3339(),
        }
    });
    let result = handle_request(&state, rpc("submit", params)).await.result.unwrap();
    assert_eq!(result["accepted"].as_array().unwrap().len(), 0);
    let rejected = result["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["code"], -32001);
}

/// Property 1 — **Id uniqueness**: across many submitted entries in one
/// run, no two assigned ids collide.
#[tokio::test]
async fn ids_are_unique_across_many_submissions() {
    let state = test_state();
    let entries: Vec<Value> = (0..200)
        .map(|i| {
            json!({
                "kind": "log",
                "source": "app",
                "component": "api",
                "level": "info",
                "message": format!("entry {i}"),
            })
        })
        .collect();
    let result = handle_request(&state, rpc("submit", json!({ "entries": entries }))).await.result.unwrap();
    let accepted = result["accepted"].as_array().unwrap();
    assert_eq!(accepted.len(), 200);
    let ids: HashSet<&str> = accepted.iter().map(|a| a["id"].as_str().unwrap()).collect();
    assert_eq!(ids.len(), 200, "every assigned id must be unique");
}

/// Property 2 — **Append-preserves-content**: every Entry `query` returns
/// equals one previously submitted, and querying with a disjoint filter
/// produces no ghost entries.
#[tokio::test]
async fn query_never_returns_entries_outside_the_requested_source() {
    let state = test_state();
    let params = json!({
        "entries": [
            {"kind": "log", "source": "app", "component": "api", "level": "info", "message": "from app"},
            {"kind": "log", "source": "system", "component": "host-01", "level": "info", "message": "from system"},
        ]
    });
    handle_request(&state, rpc("submit", params)).await.result.unwrap();
    drain_bus_to_store(&state).await;

    let result = handle_request(&state, rpc("query", json!({ "filter": { "sources": ["app"] } })))
        .await
        .result
        .unwrap();
    let entries = result["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["source"], "app");
    assert_eq!(entries[0]["message"], "from app");
}
