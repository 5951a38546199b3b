//! Shared application state threaded through every handler, the same
//! `Clone`-cheap `Arc`-bundle shape `dashflow-observability`'s
//! `ServerState` uses for its websocket server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use signalhub_collect::CollectorPool;
use signalhub_fanout::{FanoutHub, SubscriptionSpec};
use signalhub_ingest::IngestionBus;
use signalhub_parsers::ParserRegistry;
use signalhub_store::EntryStore;
use uuid::Uuid;

use crate::idempotency::IdempotencyCache;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntryStore>,
    pub bus: IngestionBus,
    pub fanout: Arc<FanoutHub>,
    pub parsers: Arc<ParserRegistry>,
    pub idempotency: Arc<IdempotencyCache>,
    /// Server-side persistent subscriptions registered via the `subscribe`/
    /// `unsubscribe` RPC methods (spec §4.I: "independent of the push
    /// stream"). A push-stream connection may reference one of these ids in
    /// its own `subscribe` frame to attach a live transport to it.
    pub pending_subscriptions: Arc<DashMap<Uuid, SubscriptionSpec>>,
    /// Present when this process also runs a Collector Pool (the typical
    /// single-binary deployment); absent for a Server run standalone
    /// against an external submit stream.
    pub collectors: Option<Arc<CollectorPool>>,
    pub default_query_limit: usize,
    pub max_query_limit: usize,
    /// Set during graceful shutdown step 1 (spec §5: "Server stops
    /// accepting new connections"). `/health` reports `503` and the RPC/WS
    /// entry points reject new work with `ServerError::ShuttingDown` once
    /// set.
    draining: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EntryStore>,
        bus: IngestionBus,
        fanout: Arc<FanoutHub>,
        parsers: Arc<ParserRegistry>,
    ) -> AppState {
        AppState {
            store,
            bus,
            fanout,
            parsers,
            idempotency: Arc::new(IdempotencyCache::new()),
            pending_subscriptions: Arc::new(DashMap::new()),
            collectors: None,
            default_query_limit: 1_000,
            max_query_limit: 10_000,
            draining: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_collectors(mut self, collectors: Arc<CollectorPool>) -> AppState {
        self.collectors = Some(collectors);
        self
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Flips the server into draining mode (graceful shutdown step 1).
    pub fn begin_draining(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }
}
