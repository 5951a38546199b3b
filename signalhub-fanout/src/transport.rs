//! The Fanout Hub is transport-agnostic (spec §4.I "transport-agnostic
//! guarantees"): it hands frames to whatever sink a subscriber registered
//! with, and the Server crate supplies the real WebSocket sink. Keeping the
//! trait here (rather than depending on axum) is what lets this crate stay
//! free of any HTTP/WS dependency, mirroring how `dashflow-observability`
//! separates its `replay_buffer` delivery logic from the websocket framing
//! in `handlers.rs`.

use async_trait::async_trait;
use signalhub_core::{Alert, Entry};

/// One frame pushed to a subscriber (spec §6.3). `Closing` is not one of
/// the wire frame types named in §6.3 — it's the graceful-close signal
/// (spec §5 shutdown step 6, "Fanout Hub closes subscribers with a
/// graceful-close frame") a `Transport` translates into its own native
/// close handshake (e.g. a WebSocket close frame) rather than a JSON frame.
#[derive(Debug, Clone)]
pub enum PushFrame {
    Entry(Entry),
    Alert(Alert),
    Heartbeat,
    DropNotice { dropped: u64 },
    Closing,
}

/// A subscriber's outbound transport. Implementations write `frame` onto
/// the wire (a WebSocket message, in the Server crate) and report transport
/// failure so the delivery worker can close the subscription.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, frame: PushFrame) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
#[error("transport send failed: {0}")]
pub struct TransportError(pub String);
