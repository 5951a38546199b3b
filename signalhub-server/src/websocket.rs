//! The push-stream surface (spec §4.I/§6.3): a long-lived WebSocket
//! connection, ordered and message-framed, duplex. Each connection runs its
//! own read loop plus a 30s heartbeat; a missed heartbeat beyond 90s closes
//! the connection server-side. Grounded in
//! `dashflow-observability::bin::websocket_server::handlers::handle_socket`
//! (native-ping/JSON-ping handling, per-connection send-with-timeout).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use signalhub_fanout::{PushFrame, SubscriptionSpec, Transport, TransportError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::metrics::WS_CONNECTIONS_TOTAL;
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(90);
const SEND_QUEUE_CAPACITY: usize = 1_000;

/// `GET /ws`: upgrades to a WebSocket and hands off to [`handle_socket`].
/// Rejected while the server is draining (spec §5 shutdown step 1).
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Sends [`PushFrame`]s to one WebSocket connection. Implements
/// [`Transport`] so the Fanout Hub can treat this connection exactly like
/// any other subscriber's sink (spec §4.H: "transport-agnostic").
struct WsTransport {
    tx: mpsc::Sender<Message>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: PushFrame) -> Result<(), TransportError> {
        let message = match &frame {
            // Spec §5 step 6's graceful-close frame is the transport's own
            // close handshake, not a JSON push frame.
            PushFrame::Closing => Message::Close(None),
            _ => Message::Text(frame_to_json(&frame).to_string()),
        };
        self.tx.send(message).await.map_err(|e| TransportError(e.to_string()))
    }
}

fn frame_to_json(frame: &PushFrame) -> Value {
    match frame {
        PushFrame::Entry(entry) => {
            let mut value = serde_json::to_value(entry).unwrap_or(Value::Null);
            if let Some(obj) = value.as_object_mut() {
                obj.insert("type".to_string(), json!("entry"));
            }
            value
        }
        PushFrame::Alert(alert) => {
            let mut value = serde_json::to_value(alert).unwrap_or(Value::Null);
            if let Some(obj) = value.as_object_mut() {
                obj.insert("type".to_string(), json!("alert"));
            }
            value
        }
        PushFrame::Heartbeat => json!({ "type": "heartbeat", "ts": Utc::now() }),
        PushFrame::DropNotice { dropped } => {
            json!({ "type": "drop_notice", "count": dropped, "since_ts": Utc::now() })
        }
        // Never actually serialized: `WsTransport::send` intercepts this
        // variant before reaching here. Kept so the match stays exhaustive.
        PushFrame::Closing => json!({ "type": "closing" }),
    }
}

/// Pumps queued outbound messages onto the socket. A dedicated task owning
/// the sink half is what lets [`WsTransport::send`] (called from the
/// Fanout Hub's per-subscriber delivery worker) and the heartbeat/ack
/// writes in the read loop share one connection without fighting over a
/// `&mut` sink.
async fn forward_to_socket(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Message>) {
    while let Some(message) = rx.recv().await {
        if sink.send(message).await.is_err() {
            break;
        }
    }
}

/// Drives one connection end-to-end: spawns the write-side forwarder, then
/// loops reading client frames (`subscribe`, `unsubscribe`, `ping`) until
/// the socket closes or the heartbeat times out.
async fn handle_socket(socket: WebSocket, state: AppState) {
    WS_CONNECTIONS_TOTAL.with_label_values(&["opened"]).inc();
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::channel::<Message>(SEND_QUEUE_CAPACITY);
    let forwarder = tokio::spawn(forward_to_socket(sink, rx));

    let transport: Arc<dyn Transport> = Arc::new(WsTransport { tx: tx.clone() });
    // client-correlation id -> hub subscriber id, so `unsubscribe {id}`
    // (spec §6.3) can look up what to tear down.
    let mut subscriptions: HashMap<String, Uuid> = HashMap::new();
    let mut last_activity = Instant::now();

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if last_activity.elapsed() > HEARTBEAT_TIMEOUT {
                    warn!("closing push-stream connection after missed heartbeat");
                    break;
                }
                if tx.send(Message::Text(json!({"type": "heartbeat", "ts": Utc::now()}).to_string())).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();
                        handle_client_frame(&state, &text, &tx, &transport, &mut subscriptions).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        last_activity = Instant::now();
                        let _ = tx.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_activity = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "push-stream read error");
                        break;
                    }
                }
            }
        }
    }

    for id in subscriptions.values() {
        state.fanout.unsubscribe(*id);
    }
    forwarder.abort();
    WS_CONNECTIONS_TOTAL.with_label_values(&["closed"]).inc();
}

async fn handle_client_frame(
    state: &AppState,
    text: &str,
    tx: &mpsc::Sender<Message>,
    transport: &Arc<dyn Transport>,
    subscriptions: &mut HashMap<String, Uuid>,
) {
    let Ok(frame) = serde_json::from_str::<Value>(text) else {
        let _ = tx.send(Message::Text(json!({"type": "nack", "reason": "malformed json"}).to_string())).await;
        return;
    };
    match frame.get("type").and_then(Value::as_str) {
        Some("ping") => {
            let _ = tx.send(Message::Text(json!({"type": "pong"}).to_string())).await;
        }
        Some("subscribe") => {
            let id = frame.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
            let spec: SubscriptionSpec = frame
                .get("filter")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .ok()
                .flatten()
                .unwrap_or_default();
            match state.fanout.subscribe(&spec, transport.clone()) {
                Ok(subscriber_id) => {
                    subscriptions.insert(id.clone(), subscriber_id);
                    let _ = tx.send(Message::Text(json!({"type": "ack", "id": id}).to_string())).await;
                }
                Err(e) => {
                    let _ = tx
                        .send(Message::Text(json!({"type": "nack", "id": id, "reason": e.to_string()}).to_string()))
                        .await;
                }
            }
        }
        Some("unsubscribe") => {
            let id = frame.get("id").and_then(Value::as_str).unwrap_or_default();
            if let Some(subscriber_id) = subscriptions.remove(id) {
                state.fanout.unsubscribe(subscriber_id);
            }
        }
        _ => {
            let _ = tx
                .send(Message::Text(json!({"type": "nack", "reason": "unknown frame type"}).to_string()))
                .await;
        }
    }
}
