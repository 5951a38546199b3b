//! Per-subscriber state (spec §3.5/§4.H): a bounded outgoing queue, a drop
//! counter, and a consecutive-drop escalation to close. Each subscriber gets
//! its own delivery task reading from the queue so one slow subscriber never
//! blocks another (spec §8 property 7, "fanout isolation"), the same shape
//! `dashflow-observability`'s `ConnectionRateLimiter`/per-connection
//! broadcast channel pair uses to isolate one client's backpressure from the
//! rest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::filter::CompiledFilter;
use crate::metrics::{DELIVERED_TOTAL, DROPPED_TOTAL, SUBSCRIBER_CLOSED_TOTAL};
use crate::transport::{PushFrame, Transport};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000;
const CLOSE_AFTER_CONSECUTIVE_DROPS: u32 = 3;

/// Per-subscriber overflow accounting, shared between the fanout loop
/// (which enqueues) and the delivery worker (which resets the consecutive
/// counter on successful delivery).
#[derive(Debug, Default)]
pub struct DropCounter {
    total: AtomicU64,
    consecutive: AtomicU64,
}

impl DropCounter {
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    fn record_drop(&self) -> u64 {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.consecutive.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_delivery(&self) {
        self.consecutive.store(0, Ordering::Relaxed);
    }
}

/// A registered subscriber: its compiled filter, enqueue handle, and drop
/// bookkeeping. Owned by the [`crate::hub::FanoutHub`] registry; dropped
/// (and its delivery task aborted) on unsubscribe or connection close (spec
/// §3.5: "destroyed on connection close").
pub struct Subscriber {
    pub id: Uuid,
    pub filter: CompiledFilter,
    queue: mpsc::Sender<PushFrame>,
    drops: Arc<DropCounter>,
    delivery: JoinHandle<()>,
}

impl Subscriber {
    pub fn new(id: Uuid, filter: CompiledFilter, transport: Arc<dyn Transport>) -> Subscriber {
        Subscriber::with_capacity(id, filter, transport, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        id: Uuid,
        filter: CompiledFilter,
        transport: Arc<dyn Transport>,
        capacity: usize,
    ) -> Subscriber {
        let (tx, rx) = mpsc::channel(capacity);
        let drops = Arc::new(DropCounter::default());
        let delivery = spawn_delivery_worker(id, rx, transport, drops.clone());
        Subscriber {
            id,
            filter,
            queue: tx,
            drops,
            delivery,
        }
    }

    /// Enqueues `frame`, applying the drop_new overflow policy (spec §4.H).
    /// Returns `false` once three consecutive drops have occurred, the
    /// signal the hub uses to close this subscription.
    pub fn try_enqueue(&self, frame: PushFrame) -> bool {
        match self.queue.try_send(frame) {
            Ok(()) => true,
            Err(_) => {
                let consecutive = self.drops.record_drop();
                DROPPED_TOTAL.with_label_values(&[&self.id.to_string()]).inc();
                if consecutive >= CLOSE_AFTER_CONSECUTIVE_DROPS as u64 {
                    warn!(subscriber = %self.id, consecutive, "closing subscriber after consecutive drops");
                    SUBSCRIBER_CLOSED_TOTAL.with_label_values(&["consecutive_drops"]).inc();
                    false
                } else {
                    true
                }
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.drops.total()
    }

    pub fn close(self) {
        self.delivery.abort();
    }

    /// The graceful-shutdown counterpart to `close` (spec §5 step 6):
    /// pushes a [`PushFrame::Closing`] frame, then drops the queue sender
    /// and waits for the delivery worker to drain whatever was already
    /// queued (including the close frame) and exit on its own, rather than
    /// aborting it mid-send.
    pub async fn close_gracefully(self) {
        let _ = self.queue.try_send(PushFrame::Closing);
        drop(self.queue);
        let _ = self.delivery.await;
    }
}

fn spawn_delivery_worker(
    id: Uuid,
    mut rx: mpsc::Receiver<PushFrame>,
    transport: Arc<dyn Transport>,
    drops: Arc<DropCounter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match transport.send(frame).await {
                Ok(()) => {
                    drops.record_delivery();
                    DELIVERED_TOTAL.with_label_values(&[&id.to_string()]).inc();
                }
                Err(e) => {
                    debug!(subscriber = %id, error = %e, "subscriber transport closed");
                    break;
                }
            }
        }
    })
}
