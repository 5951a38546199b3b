//! The Ingestion Bus (spec §4.E): a single bounded, multi-producer,
//! single-consumer queue sitting between Collectors/the submit API and the
//! Enricher.
//!
//! `tokio::sync::mpsc` is a natural fit for the producer/consumer shape but
//! gives no way to evict the oldest queued item, which the default overflow
//! policy needs. Instead the bus is a `Mutex<VecDeque<Entry>>` guarded by a
//! `Notify` pair, mirroring the bounded-resource-behind-a-lock shape
//! `dashflow-streaming::rate_limiter`'s token bucket uses, generalized from
//! a rate limit to a FIFO queue.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use signalhub_core::{Entry, MetricType};
use tokio::sync::{Mutex, Notify};
use tracing::warn;

use crate::error::{IngestError, IngestResult};
use crate::metrics::{BUS_ACCEPTED_TOTAL, BUS_DEPTH, BUS_DROPPED_TOTAL};

/// Overflow behavior applied when the bus is at capacity (spec §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait up to the given duration for space, then fall back to
    /// `DropOldest`.
    BlockUpToMs(u64),
    DropNew,
    DropOldest,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::BlockUpToMs(50)
    }
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub name: String,
    pub capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            name: "default".to_string(),
            capacity: 10_000,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

struct Inner {
    queue: Mutex<VecDeque<Entry>>,
    not_empty: Notify,
    not_full: Notify,
    closed: AtomicBool,
    dropped_count: AtomicU64,
}

/// Bounded queue connecting producers (Collectors, the submit RPC) to the
/// Enricher, the bus's sole consumer.
#[derive(Clone)]
pub struct IngestionBus {
    inner: Arc<Inner>,
    config: BusConfig,
}

impl IngestionBus {
    pub fn new(config: BusConfig) -> IngestionBus {
        IngestionBus {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::with_capacity(config.capacity.min(1024))),
                not_empty: Notify::new(),
                not_full: Notify::new(),
                closed: AtomicBool::new(false),
                dropped_count: AtomicU64::new(0),
            }),
            config,
        }
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub async fn len(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped_count.load(Ordering::Relaxed)
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.not_empty.notify_waiters();
        self.inner.not_full.notify_waiters();
    }

    /// Accepts a single Entry, applying the configured overflow policy if
    /// the bus is at capacity. Internal re-entrance (emitting the
    /// `dropped_count` notice) is capped at one level deep.
    pub async fn submit(&self, entry: Entry) -> IngestResult<()> {
        self.submit_inner(entry, true).await
    }

    pub async fn submit_batch(&self, entries: Vec<Entry>) -> IngestResult<()> {
        for entry in entries {
            self.submit(entry).await?;
        }
        Ok(())
    }

    async fn submit_inner(&self, entry: Entry, emit_drop_notice: bool) -> IngestResult<()> {
        self.submit_inner_with_policy(entry, emit_drop_notice, self.config.overflow_policy).await
    }

    /// `policy` overrides `self.config.overflow_policy` for this one
    /// enqueue. Used to force the re-entrant drop-notice Entry (spec §4.E:
    /// "the overflow of *that* entry is `drop_new` to prevent feedback
    /// loops") onto `DropNew` regardless of what the bus itself is
    /// configured with, so a `BlockUpToMs`-configured bus can never have its
    /// own notice-of-drop block or recurse into another eviction.
    async fn submit_inner_with_policy(&self, entry: Entry, emit_drop_notice: bool, policy: OverflowPolicy) -> IngestResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(IngestError::Closed);
        }

        loop {
            {
                let mut guard = self.inner.queue.lock().await;
                if guard.len() < self.config.capacity {
                    guard.push_back(entry);
                    drop(guard);
                    BUS_ACCEPTED_TOTAL.with_label_values(&[&self.config.name]).inc();
                    BUS_DEPTH
                        .with_label_values(&[&self.config.name])
                        .set(self.len().await as i64);
                    self.inner.not_empty.notify_one();
                    return Ok(());
                }
            }

            match policy {
                OverflowPolicy::DropNew => {
                    self.record_drop("drop_new");
                    return Ok(());
                }
                OverflowPolicy::DropOldest => {
                    self.evict_oldest_and_push(entry).await;
                    self.record_drop("drop_oldest");
                    if emit_drop_notice {
                        self.emit_drop_notice().await;
                    }
                    return Ok(());
                }
                OverflowPolicy::BlockUpToMs(t) => {
                    let waited = tokio::time::timeout(Duration::from_millis(t), self.inner.not_full.notified()).await;
                    if waited.is_err() {
                        // Timed out waiting for space; fall back to drop_oldest per spec §4.E.
                        self.evict_oldest_and_push(entry).await;
                        self.record_drop("drop_oldest_after_timeout");
                        if emit_drop_notice {
                            self.emit_drop_notice().await;
                        }
                        return Ok(());
                    }
                    // Woken up; loop back and retry the capacity check.
                }
            }
        }
    }

    async fn evict_oldest_and_push(&self, entry: Entry) {
        let mut guard = self.inner.queue.lock().await;
        guard.pop_front();
        guard.push_back(entry);
        drop(guard);
        self.inner.not_full.notify_one();
    }

    fn record_drop(&self, reason: &str) {
        self.inner.dropped_count.fetch_add(1, Ordering::Relaxed);
        BUS_DROPPED_TOTAL
            .with_label_values(&[&self.config.name, reason])
            .inc();
        warn!(bus = %self.config.name, reason, "ingestion bus overflow");
    }

    async fn emit_drop_notice(&self) {
        let notice = Entry::new_metric(
            Utc::now(),
            "signalhub",
            "ingestion_bus",
            "ingestion_bus.dropped_count",
            self.dropped_count() as f64,
            Some("count".to_string()),
            Default::default(),
        )
        .map(|e| e.with_metric_type(MetricType::Counter));
        if let Ok(notice) = notice {
            // Depth-one re-entrance only: never itself triggers another
            // notice, and always enqueues as `drop_new` regardless of the
            // bus's own overflow policy.
            let _ = Box::pin(self.submit_inner_with_policy(notice, false, OverflowPolicy::DropNew)).await;
        }
    }

    /// Consumer-side receive; only the Enricher calls this. Returns `None`
    /// once the bus is closed and drained.
    pub async fn recv(&self) -> Option<Entry> {
        loop {
            {
                let mut guard = self.inner.queue.lock().await;
                if let Some(entry) = guard.pop_front() {
                    drop(guard);
                    self.inner.not_full.notify_one();
                    return Some(entry);
                }
                if self.inner.closed.load(Ordering::SeqCst) {
                    return None;
                }
            }
            self.inner.not_empty.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalhub_core::Level;
    use std::collections::BTreeMap;

    fn log(n: u32) -> Entry {
        Entry::new_log(
            Utc::now(),
            "app",
            "api",
            Level::Info,
            format!("entry-{n}"),
            BTreeMap::new(),
            None,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn accepts_until_capacity() {
        let bus = IngestionBus::new(BusConfig {
            capacity: 2,
            overflow_policy: OverflowPolicy::DropNew,
            ..Default::default()
        });
        bus.submit(log(0)).await.unwrap();
        bus.submit(log(1)).await.unwrap();
        assert_eq!(bus.len().await, 2);
    }

    #[tokio::test]
    async fn drop_new_discards_when_full() {
        let bus = IngestionBus::new(BusConfig {
            capacity: 1,
            overflow_policy: OverflowPolicy::DropNew,
            ..Default::default()
        });
        bus.submit(log(0)).await.unwrap();
        bus.submit(log(1)).await.unwrap();
        assert_eq!(bus.len().await, 1);
        assert_eq!(bus.dropped_count(), 1);
    }

    #[tokio::test]
    async fn drop_oldest_evicts_head_and_emits_notice() {
        let bus = IngestionBus::new(BusConfig {
            capacity: 1,
            overflow_policy: OverflowPolicy::DropOldest,
            ..Default::default()
        });
        bus.submit(log(0)).await.unwrap();
        bus.submit(log(1)).await.unwrap();
        // Capacity 1 + the re-entrant drop-notice entry briefly occupies the
        // slot too, so drain and check we see the newer payload entry.
        let mut saw_entry_1 = false;
        while let Some(e) = {
            let mut guard = bus.inner.queue.lock().await;
            guard.pop_front()
        } {
            if let signalhub_core::EntryKind::Log { message, .. } = &e.kind {
                if message == "entry-1" {
                    saw_entry_1 = true;
                }
            }
        }
        assert!(saw_entry_1);
        assert!(bus.dropped_count() >= 1);
    }

    #[tokio::test]
    async fn drop_notice_never_blocks_even_under_block_policy() {
        let bus = IngestionBus::new(BusConfig {
            capacity: 1,
            overflow_policy: OverflowPolicy::BlockUpToMs(100),
            ..Default::default()
        });
        bus.submit(log(0)).await.unwrap();

        let start = std::time::Instant::now();
        bus.submit(log(1)).await.unwrap();
        let elapsed = start.elapsed();

        // The main entry blocks up to ~100ms before falling back to
        // drop_oldest; the re-entrant drop-notice enqueue is forced to
        // `drop_new` and must not add a second blocking wait on top of that.
        assert!(
            elapsed < Duration::from_millis(180),
            "elapsed {elapsed:?} suggests the drop notice itself blocked"
        );
    }

    #[tokio::test]
    async fn recv_returns_none_after_close_and_drain() {
        let bus = IngestionBus::new(BusConfig::default());
        bus.submit(log(0)).await.unwrap();
        bus.close();
        assert!(bus.recv().await.is_some());
        assert!(bus.recv().await.is_none());
    }
}
