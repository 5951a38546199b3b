//! The Collector Pool (spec §4.C/§5): owns every registered [`Collector`],
//! runs each on its own interval-driven schedule, and submits what it
//! produces onto the shared [`signalhub_ingest::IngestionBus`]. Each
//! collector's loop is independent, so a stuck probe on one source never
//! delays another's schedule (spec §5, "collectors poll concurrently").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use signalhub_ingest::IngestionBus;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::collector::{Collector, CollectorStatus};
use crate::metrics::{COLLECTOR_ENTRIES_TOTAL, COLLECTOR_POLLS_TOTAL, COLLECTOR_STATE};
use crate::state::CollectorState;

struct PoolEntry {
    collector: Arc<Mutex<Collector>>,
    handle: JoinHandle<()>,
}

/// Supervises a set of collectors, each polled on its own `interval` by an
/// independently scheduled task. `collector.lock()` is an async mutex held
/// only for the duration of a single poll or status/control call, never
/// across a scheduling tick, so one collector's slow probe never blocks
/// another's control operations.
pub struct CollectorPool {
    bus: IngestionBus,
    entries: std::sync::Mutex<HashMap<String, PoolEntry>>,
}

impl CollectorPool {
    pub fn new(bus: IngestionBus) -> CollectorPool {
        CollectorPool {
            bus,
            entries: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Registers a collector and starts its schedule loop immediately
    /// (the collector itself remains `Stopped` until [`CollectorPool::start`]
    /// is called).
    pub fn register(&self, collector: Collector, interval: Duration) {
        let id = collector.id().to_string();
        let collector = Arc::new(Mutex::new(collector));
        let handle = spawn_schedule_loop(id.clone(), Arc::clone(&collector), self.bus.clone(), interval);
        self.entries
            .lock()
            .expect("pool registry mutex poisoned")
            .insert(id, PoolEntry { collector, handle });
    }

    pub async fn start(&self, id: &str) -> bool {
        self.with_collector(id, |c| c.start()).await
    }

    pub async fn stop(&self, id: &str) -> bool {
        self.with_collector(id, |c| c.stop()).await
    }

    pub async fn pause(&self, id: &str) -> bool {
        self.with_collector(id, |c| c.pause()).await
    }

    pub async fn reset(&self, id: &str) -> bool {
        self.with_collector(id, |c| c.reset()).await
    }

    async fn with_collector(&self, id: &str, f: impl FnOnce(&mut Collector)) -> bool {
        let handle = {
            let entries = self.entries.lock().expect("pool registry mutex poisoned");
            entries.get(id).map(|e| Arc::clone(&e.collector))
        };
        match handle {
            Some(collector) => {
                f(&mut *collector.lock().await);
                true
            }
            None => false,
        }
    }

    /// Deregisters a collector, aborting its schedule loop (spec §4.C
    /// "remove").
    pub fn remove(&self, id: &str) -> bool {
        match self.entries.lock().expect("pool registry mutex poisoned").remove(id) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Status of every registered collector (spec §6 `status`). Ordering
    /// follows no particular guarantee; callers that need stable ordering
    /// should sort by id.
    pub async fn status(&self) -> Vec<CollectorStatus> {
        let handles: Vec<_> = self
            .entries
            .lock()
            .expect("pool registry mutex poisoned")
            .values()
            .map(|e| Arc::clone(&e.collector))
            .collect();
        let mut out = Vec::with_capacity(handles.len());
        for collector in handles {
            out.push(collector.lock().await.status());
        }
        out
    }
}

fn spawn_schedule_loop(
    id: String,
    collector: Arc<Mutex<Collector>>,
    bus: IngestionBus,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;

            let mut guard = collector.lock().await;
            if !guard.state().can_poll() {
                set_state_gauge(&id, guard.state());
                continue;
            }

            let kind = guard.status().kind;
            match guard.poll().await {
                Ok(entries) => {
                    COLLECTOR_POLLS_TOTAL.with_label_values(&[&id, kind, "ok"]).inc();
                    let state = guard.state();
                    drop(guard);
                    if !entries.is_empty() {
                        COLLECTOR_ENTRIES_TOTAL
                            .with_label_values(&[&id, kind])
                            .inc_by(entries.len() as u64);
                        if let Err(e) = bus.submit_batch(entries).await {
                            warn!(collector_id = %id, error = %e, "failed to submit collected entries");
                        }
                    }
                    set_state_gauge(&id, state);
                }
                Err(e) => {
                    COLLECTOR_POLLS_TOTAL.with_label_values(&[&id, kind, "error"]).inc();
                    error!(collector_id = %id, error = %e, "collector poll failed");
                    let state = guard.state();
                    drop(guard);
                    set_state_gauge(&id, state);
                }
            }
        }
    })
}

fn set_state_gauge(id: &str, state: CollectorState) {
    for candidate in [
        CollectorState::Stopped,
        CollectorState::Active,
        CollectorState::Paused,
        CollectorState::Error,
    ] {
        let value = if candidate == state { 1 } else { 0 };
        COLLECTOR_STATE
            .with_label_values(&[id, &candidate.to_string()])
            .set(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorKind;
    use crate::system::{SystemCollector, SystemCollectorConfig};
    use signalhub_ingest::BusConfig;

    #[tokio::test]
    async fn register_and_start_makes_status_visible() {
        let bus = IngestionBus::new(BusConfig::default());
        let pool = CollectorPool::new(bus);
        let collector = Collector::new(
            "sys-1",
            CollectorKind::System(SystemCollector::new(SystemCollectorConfig::default())),
        );
        pool.register(collector, Duration::from_millis(50));
        assert!(pool.start("sys-1").await);

        let statuses = pool.status().await;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].state, CollectorState::Active);
    }

    #[tokio::test]
    async fn unknown_id_operations_return_false() {
        let bus = IngestionBus::new(BusConfig::default());
        let pool = CollectorPool::new(bus);
        assert!(!pool.start("missing").await);
        assert!(!pool.remove("missing"));
    }

    #[tokio::test]
    async fn remove_aborts_schedule_loop() {
        let bus = IngestionBus::new(BusConfig::default());
        let pool = CollectorPool::new(bus);
        let collector = Collector::new(
            "sys-1",
            CollectorKind::System(SystemCollector::new(SystemCollectorConfig::default())),
        );
        pool.register(collector, Duration::from_millis(50));
        assert!(pool.remove("sys-1"));
        assert!(pool.status().await.is_empty());
    }
}
