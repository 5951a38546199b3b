//! The JSON-RPC 2.0 request/response surface (spec §4.I/§6.2): `submit`,
//! `submit_raw`, `query`, `query_alerts`, `stats`, `subscribe`,
//! `unsubscribe`. One `POST /rpc` handler dispatches by `method`, matching
//! the single-endpoint JSON-RPC shape the original `log-system/python/
//! main.py` exposes (SPEC_FULL.md §4.I).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use signalhub_core::{check_timestamp_skew, Entry, Level, MetricType, QueryFilter, TimeRange};
use signalhub_fanout::SubscriptionSpec;
use signalhub_store::{AlertFilter, Continuation, Order};
use uuid::Uuid;

use crate::error::ServerError;
use crate::metrics::{gather_counter_sum, RPC_REQUESTS_TOTAL};
use crate::state::AppState;

/// Maximum `query`/`query_alerts` page size (spec §6.2: "limit≤10000").
const MAX_LIMIT: usize = 10_000;

/// Skew tolerance applied to submitted timestamps (spec §3.1). Not yet
/// surfaced as an environment override; see DESIGN.md.
fn default_skew_tolerance() -> chrono::Duration {
    chrono::Duration::seconds(30)
}

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default = "default_jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

fn default_jsonrpc_version() -> String {
    "2.0".to_string()
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// Dispatches one request to its method handler and always returns a
/// response body — errors are represented in the JSON-RPC envelope, never
/// as an HTTP error status (spec §7: "clients see explicit per-entry
/// rejection reasons ... not an all-or-nothing failure").
pub async fn handle_request(state: &AppState, request: RpcRequest) -> RpcResponse {
    let outcome = dispatch(state, &request.method, request.params).await;
    match outcome {
        Ok(result) => {
            RPC_REQUESTS_TOTAL.with_label_values(&[&request.method, "ok"]).inc();
            RpcResponse {
                jsonrpc: "2.0",
                id: request.id,
                result: Some(result),
                error: None,
            }
        }
        Err(e) => {
            RPC_REQUESTS_TOTAL.with_label_values(&[&request.method, "error"]).inc();
            RpcResponse {
                jsonrpc: "2.0",
                id: request.id,
                result: None,
                error: Some(RpcErrorBody { code: e.code(), message: e.to_string() }),
            }
        }
    }
}

async fn dispatch(state: &AppState, method: &str, params: Value) -> Result<Value, ServerError> {
    if state.is_draining() {
        return Err(ServerError::ShuttingDown);
    }
    match method {
        "submit" => submit(state, params).await,
        "submit_raw" => submit_raw(state, params).await,
        "query" => query(state, params).await,
        "query_alerts" => query_alerts(state, params).await,
        "stats" => stats(state).await,
        "subscribe" => subscribe(state, params),
        "unsubscribe" => unsubscribe(state, params),
        other => Err(ServerError::InvalidRequest(format!("unknown method {other:?}"))),
    }
}

/// One producer-supplied entry as it arrives over the wire (spec §6.1):
/// everything an [`Entry`] carries except `id`, which is assigned on
/// ingest.
#[derive(Debug, Deserialize)]
struct SubmitEntry {
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    source: String,
    component: String,
    #[serde(flatten)]
    kind: SubmitKind,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default)]
    correlation_id: Option<String>,
    #[serde(default)]
    raw: Option<String>,
}

fn default_level() -> Level {
    Level::Unknown
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum SubmitKind {
    Log {
        #[serde(default = "default_level")]
        level: Level,
        message: String,
    },
    Metric {
        metric_name: String,
        value: f64,
        #[serde(default)]
        unit: Option<String>,
        #[serde(default)]
        metric_type: Option<MetricType>,
    },
}

impl SubmitEntry {
    fn into_entry(self, now: DateTime<Utc>) -> Result<Entry, ServerError> {
        let timestamp = self.timestamp.unwrap_or(now);
        check_timestamp_skew(timestamp, now, default_skew_tolerance())?;
        let entry = match self.kind {
            SubmitKind::Log { level, message } => Entry::new_log(
                timestamp,
                self.source,
                self.component,
                level,
                message,
                self.tags,
                self.correlation_id,
                self.raw,
            )?,
            SubmitKind::Metric { metric_name, value, unit, metric_type } => {
                let entry = Entry::new_metric(
                    timestamp,
                    self.source,
                    self.component,
                    metric_name,
                    value,
                    unit,
                    self.tags,
                )?;
                match metric_type {
                    Some(t) => entry.with_metric_type(t),
                    None => entry,
                }
            }
        };
        Ok(entry)
    }
}

#[derive(Debug, Serialize)]
struct Accepted {
    id: Uuid,
}

#[derive(Debug, Serialize)]
struct Rejected {
    index: usize,
    code: i64,
    message: String,
}

/// `submit(entries[]) -> {accepted: [{id}], rejected: [{index, code,
/// message}]}` (spec §6.2). Partial success: one malformed entry does not
/// fail the batch. Idempotent on `(client_id, sequence)` when both are
/// supplied (spec §8).
async fn submit(state: &AppState, params: Value) -> Result<Value, ServerError> {
    let client_id = params.get("client_id").and_then(Value::as_str).map(str::to_string);
    let sequence = params.get("sequence").and_then(Value::as_u64);

    if let (Some(client_id), Some(sequence)) = (&client_id, sequence) {
        if let Some(ids) = state.idempotency.get(client_id, sequence) {
            let accepted: Vec<Accepted> = ids.into_iter().map(|id| Accepted { id }).collect();
            return Ok(json!({ "accepted": accepted, "rejected": Vec::<Rejected>::new() }));
        }
    }

    let raw_entries = params.get("entries").cloned().unwrap_or(Value::Null);
    let submissions: Vec<SubmitEntry> = if raw_entries.is_array() {
        serde_json::from_value(raw_entries).map_err(|e| ServerError::InvalidRequest(e.to_string()))?
    } else if raw_entries.is_object() {
        vec![serde_json::from_value(raw_entries).map_err(|e| ServerError::InvalidRequest(e.to_string()))?]
    } else {
        return Err(ServerError::InvalidRequest("params.entries must be an object or array".to_string()));
    };

    let now = Utc::now();
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    let mut to_submit = Vec::with_capacity(submissions.len());

    for (index, submission) in submissions.into_iter().enumerate() {
        match submission.into_entry(now) {
            Ok(entry) => {
                accepted.push(Accepted { id: entry.id });
                to_submit.push(entry);
            }
            Err(e) => rejected.push(Rejected { index, code: e.code(), message: e.to_string() }),
        }
    }

    if !to_submit.is_empty() {
        state.bus.submit_batch(to_submit).await?;
    }

    if let (Some(client_id), Some(sequence)) = (client_id, sequence) {
        state.idempotency.record(&client_id, sequence, accepted.iter().map(|a| a.id).collect());
    }

    Ok(json!({ "accepted": accepted, "rejected": rejected }))
}

#[derive(Debug, Serialize)]
struct RawError {
    line_index: usize,
    message: String,
}

/// `submit_raw({source, format, lines[]}) -> {parsed: Entry[], errors:
/// [{line_index, message}]}` (spec §6.2/§4.J).
async fn submit_raw(state: &AppState, params: Value) -> Result<Value, ServerError> {
    #[derive(Deserialize)]
    struct Params {
        source: String,
        #[serde(default = "default_component")]
        component: String,
        #[serde(default = "default_format")]
        format: String,
        lines: Vec<String>,
        #[serde(default = "default_session")]
        session: String,
    }
    fn default_component() -> String {
        "unknown".to_string()
    }
    fn default_format() -> String {
        "auto".to_string()
    }
    fn default_session() -> String {
        "default".to_string()
    }

    let params: Params = serde_json::from_value(params).map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
    let outcomes = state
        .parsers
        .parse_batch(&params.source, &params.component, &params.format, &params.lines, &params.session);

    let mut parsed = Vec::new();
    let mut errors = Vec::new();
    let mut to_submit = Vec::new();
    for outcome in outcomes {
        match outcome {
            signalhub_parsers::ParseOutcome::Parsed(entry) => {
                parsed.push(entry.clone());
                to_submit.push(entry);
            }
            signalhub_parsers::ParseOutcome::Failed { line_index, message } => {
                errors.push(RawError { line_index, message })
            }
        }
    }

    if !to_submit.is_empty() {
        state.bus.submit_batch(to_submit).await?;
    }

    Ok(json!({ "parsed": parsed, "errors": errors }))
}

#[derive(Debug, Default, Deserialize)]
struct QueryParams {
    #[serde(default)]
    filter: QueryFilter,
    time_range: Option<TimeRange>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    continuation: Option<String>,
    #[serde(default)]
    descending: bool,
}

fn full_time_range() -> TimeRange {
    TimeRange { start: DateTime::<Utc>::MIN_UTC, end: DateTime::<Utc>::MAX_UTC }
}

/// `query({filter, time_range, limit≤10000, continuation}) -> {entries[],
/// next_continuation?}` (spec §6.2).
async fn query(state: &AppState, params: Value) -> Result<Value, ServerError> {
    let params: QueryParams = serde_json::from_value(params).map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
    let limit = params.limit.unwrap_or(state.default_query_limit).min(MAX_LIMIT).min(state.max_query_limit);
    let continuation = params
        .continuation
        .map(|token| Continuation::decode(&token))
        .transpose()?;
    let order = if params.descending { Order::Descending } else { Order::Ascending };

    let page = state
        .store
        .query(params.filter, params.time_range.unwrap_or_else(full_time_range), limit, order, continuation)
        .await?;

    Ok(json!({
        "entries": page.items,
        "next_continuation": page.next_continuation.map(|c| c.encode()),
    }))
}

#[derive(Debug, Default, Deserialize)]
struct QueryAlertsParams {
    #[serde(default)]
    filter: AlertFilter,
    time_range: Option<TimeRange>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    continuation: Option<String>,
    #[serde(default)]
    descending: bool,
}

async fn query_alerts(state: &AppState, params: Value) -> Result<Value, ServerError> {
    let params: QueryAlertsParams =
        serde_json::from_value(params).map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
    let limit = params.limit.unwrap_or(state.default_query_limit).min(MAX_LIMIT).min(state.max_query_limit);
    let continuation = params
        .continuation
        .map(|token| Continuation::decode(&token))
        .transpose()?;
    let order = if params.descending { Order::Descending } else { Order::Ascending };

    let page = state
        .store
        .query_alerts(params.filter, params.time_range.unwrap_or_else(full_time_range), limit, order, continuation)
        .await?;

    Ok(json!({
        "alerts": page.items,
        "next_continuation": page.next_continuation.map(|c| c.encode()),
    }))
}

/// `stats() -> {collectors, bus, analyzer, subscribers}` (spec §6.2). The
/// analyzer summary is read back from the Prometheus registry rather than
/// a direct handle, since the Analyzer owns its counters exclusively (spec
/// §5: "sliding-window statistics are owned exclusively by the Analyzer")
/// and the registry is the one place that state is already exported.
async fn stats(state: &AppState) -> Result<Value, ServerError> {
    let collectors = match &state.collectors {
        Some(pool) => serde_json::to_value(pool.status().await).unwrap_or(Value::Null),
        None => json!([]),
    };

    let bus = json!({
        "capacity": state.bus.capacity(),
        "depth": state.bus.len().await,
        "dropped_count": state.bus.dropped_count(),
    });

    let analyzer = json!({
        "entries_analyzed": gather_counter_sum("signalhub_analyzer_entries_total"),
        "alerts_emitted": gather_counter_sum("signalhub_analyzer_alerts_emitted_total"),
    });

    let subscriber_stats = state.fanout.stats();
    let subscribers = json!({
        "count": state.fanout.subscriber_count(),
        "total_dropped": subscriber_stats.iter().map(|s| s.dropped).sum::<u64>(),
    });

    Ok(json!({
        "collectors": collectors,
        "bus": bus,
        "analyzer": analyzer,
        "subscribers": subscribers,
    }))
}

#[derive(Debug, Deserialize)]
struct SubscribeParams {
    #[serde(default)]
    filter: SubscriptionSpec,
}

/// `subscribe` / `unsubscribe`: management of server-side persistent
/// subscriptions (spec §4.I), independent of any live push-stream
/// connection. A push-stream client can later reference the returned id
/// in its own `subscribe` frame (spec §6.3) to attach a live transport.
fn subscribe(state: &AppState, params: Value) -> Result<Value, ServerError> {
    let params: SubscribeParams = serde_json::from_value(params).map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
    // Validate eagerly so a bad filter is rejected before it is ever
    // attached to a live transport (spec §4.H).
    signalhub_fanout::CompiledFilter::compile(&params.filter)?;
    let id = Uuid::new_v4();
    state.pending_subscriptions.insert(id, params.filter);
    Ok(json!({ "id": id }))
}

fn unsubscribe(state: &AppState, params: Value) -> Result<Value, ServerError> {
    #[derive(Deserialize)]
    struct Params {
        id: Uuid,
    }
    let params: Params = serde_json::from_value(params).map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
    let removed = state.pending_subscriptions.remove(&params.id).is_some();
    Ok(json!({ "removed": removed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalhub_fanout::FanoutHub;
    use signalhub_ingest::{BusConfig, IngestionBus};
    use signalhub_parsers::ParserRegistry;
    use signalhub_store::MemoryStore;
    use std::sync::Arc;

    fn test_state() -> AppState {
        AppState::new(
            Arc::new(MemoryStore::new()),
            IngestionBus::new(BusConfig::default()),
            Arc::new(FanoutHub::new()),
            Arc::new(ParserRegistry::with_builtins()),
        )
    }

    #[tokio::test]
    async fn submit_accepts_a_single_log_entry() {
        let state = test_state();
        let params = json!({
            "entries": {
                "kind": "log",
                "source": "app",
                "component": "api",
                "level": "info",
                "message": "hello",
            }
        });
        let result = submit(&state, params).await.unwrap();
        assert_eq!(result["rejected"].as_array().unwrap().len(), 0);
        assert_eq!(result["accepted"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn submit_normalizes_non_canonical_level_strings() {
        let state = test_state();
        let params = json!({
            "entries": {
                "kind": "log",
                "source": "app",
                "component": "api",
                "level": "ERROR",
                "message": "boom",
            }
        });
        let result = submit(&state, params).await.unwrap();
        assert_eq!(result["accepted"].as_array().unwrap().len(), 1);
        assert_eq!(result["rejected"].as_array().unwrap().len(), 0);

        state.bus.close();
        while let Some(entry) = state.bus.recv().await {
            state.store.append(vec![entry]).await.unwrap();
        }
        let result = query(&state, json!({ "filter": { "sources": ["app"] } })).await.unwrap();
        let entries = result["entries"].as_array().unwrap();
        assert_eq!(entries[0]["level"], "error");
    }

    #[tokio::test]
    async fn submit_reports_partial_rejection() {
        let state = test_state();
        let params = json!({
            "entries": [
                {"kind": "log", "source": "", "component": "api", "level": "info", "message": "bad"},
                {"kind": "log", "source": "app", "component": "api", "level": "info", "message": "ok"},
            ]
        });
        let result = submit(&state, params).await.unwrap();
        assert_eq!(result["accepted"].as_array().unwrap().len(), 1);
        assert_eq!(result["rejected"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn submit_is_idempotent_on_client_id_and_sequence() {
        let state = test_state();
        let params = json!({
            "client_id": "producer-a",
            "sequence": 1,
            "entries": {"kind": "log", "source": "app", "component": "api", "level": "info", "message": "hi"},
        });
        let first = submit(&state, params.clone()).await.unwrap();
        let second = submit(&state, params).await.unwrap();
        assert_eq!(first["accepted"], second["accepted"]);
    }

    #[tokio::test]
    async fn query_round_trips_a_submitted_entry() {
        let state = test_state();
        let params = json!({
            "entries": {"kind": "log", "source": "app", "component": "api", "level": "info", "message": "hi"},
        });
        submit(&state, params).await.unwrap();
        state.bus.close();
        // Drain the bus directly into the store for this unit test; the
        // real pipeline wires Enricher -> Analyzer -> Store via spawned
        // tasks (see signalhub-cli), which isn't exercised here.
        while let Some(entry) = state.bus.recv().await {
            state.store.append(vec![entry]).await.unwrap();
        }

        let result = query(&state, json!({ "filter": { "sources": ["app"] } })).await.unwrap();
        assert_eq!(result["entries"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn submit_threads_metric_type_hint_through_to_query() {
        let state = test_state();
        let params = json!({
            "entries": {
                "kind": "metric",
                "source": "system",
                "component": "host-01",
                "metric_name": "cpu_percent",
                "value": 42.0,
                "metric_type": "gauge",
            }
        });
        submit(&state, params).await.unwrap();
        state.bus.close();
        while let Some(entry) = state.bus.recv().await {
            state.store.append(vec![entry]).await.unwrap();
        }

        let result = query(&state, json!({ "filter": { "sources": ["system"] } })).await.unwrap();
        let entries = result["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["metric_type"], "gauge");
    }

    #[test]
    fn subscribe_rejects_an_invalid_glob() {
        let state = test_state();
        let params = json!({ "filter": { "source_glob": "[" } });
        assert!(subscribe(&state, params).is_err());
    }

    #[test]
    fn unsubscribe_unknown_id_reports_not_removed() {
        let state = test_state();
        let result = unsubscribe(&state, json!({ "id": Uuid::new_v4() })).unwrap();
        assert_eq!(result["removed"], false);
    }
}
