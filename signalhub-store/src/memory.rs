//! In-memory `EntryStore` backend.
//!
//! Mirrors `dashflow-streaming`'s `InMemoryBackend`: zero external
//! dependencies, intended for tests and local development, data lost when
//! the store is dropped. Durability and WAL semantics are provided by
//! [`crate::sqlite::SqliteStore`] instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signalhub_core::{Alert, AlertObservationUpdate, Entry, QueryFilter, TimeRange};
use tokio::sync::RwLock;

use crate::continuation::Continuation;
use crate::error::StoreResult;
use crate::traits::{AlertFilter, EntryStore, Order, QueryPage};

/// In-memory implementation of [`EntryStore`]. All data is lost when the
/// store is dropped; intended for tests and embedded/single-process use.
pub struct MemoryStore {
    entries: RwLock<Vec<Entry>>,
    alerts: RwLock<Vec<Alert>>,
    appended: Arc<AtomicU64>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            entries: RwLock::new(Vec::new()),
            alerts: RwLock::new(Vec::new()),
            appended: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total entries appended over the lifetime of this store (used by
    /// `stats`).
    pub fn appended_count(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }
}

fn paginate_entries(
    mut matched: Vec<Entry>,
    order: Order,
    limit: usize,
    continuation: Option<Continuation>,
) -> StoreResult<QueryPage<Entry>> {
    matched.sort_by(|a, b| (a.timestamp, a.id).cmp(&(b.timestamp, b.id)));
    if order == Order::Descending {
        matched.reverse();
    }

    if let Some(cursor) = continuation {
        let key = (cursor.after_timestamp, cursor.after_id);
        matched.retain(|e| {
            let ek = (e.timestamp, e.id);
            match order {
                Order::Ascending => ek > key,
                Order::Descending => ek < key,
            }
        });
    }

    let next_continuation = if matched.len() > limit {
        let cursor_item = &matched[limit - 1];
        Some(Continuation {
            after_timestamp: cursor_item.timestamp,
            after_id: cursor_item.id,
        })
    } else {
        None
    };
    matched.truncate(limit);
    Ok(QueryPage {
        items: matched,
        next_continuation,
    })
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn append(&self, batch: Vec<Entry>) -> StoreResult<()> {
        let mut guard = self.entries.write().await;
        self.appended.fetch_add(batch.len() as u64, Ordering::Relaxed);
        guard.extend(batch);
        Ok(())
    }

    async fn query(
        &self,
        filter: QueryFilter,
        range: TimeRange,
        limit: usize,
        order: Order,
        continuation: Option<Continuation>,
    ) -> StoreResult<QueryPage<Entry>> {
        let guard = self.entries.read().await;
        let matched: Vec<Entry> = guard
            .iter()
            .filter(|e| range.contains(e.timestamp) && filter.matches(e))
            .cloned()
            .collect();
        drop(guard);
        paginate_entries(matched, order, limit.max(1), continuation)
    }

    async fn append_alerts(&self, batch: Vec<Alert>) -> StoreResult<()> {
        let mut guard = self.alerts.write().await;
        guard.extend(batch);
        Ok(())
    }

    async fn query_alerts(
        &self,
        filter: AlertFilter,
        range: TimeRange,
        limit: usize,
        order: Order,
        continuation: Option<Continuation>,
    ) -> StoreResult<QueryPage<Alert>> {
        let guard = self.alerts.read().await;
        let mut matched: Vec<Alert> = guard
            .iter()
            .filter(|a| range.contains(a.timestamp) && filter.matches(a))
            .cloned()
            .collect();
        drop(guard);

        matched.sort_by(|a, b| (a.timestamp, a.id).cmp(&(b.timestamp, b.id)));
        if order == Order::Descending {
            matched.reverse();
        }
        if let Some(cursor) = continuation {
            let key = (cursor.after_timestamp, cursor.after_id);
            matched.retain(|a| {
                let ak = (a.timestamp, a.id);
                match order {
                    Order::Ascending => ak > key,
                    Order::Descending => ak < key,
                }
            });
        }
        let limit = limit.max(1);
        let next_continuation = if matched.len() > limit {
            let cursor_item = &matched[limit - 1];
            Some(Continuation {
                after_timestamp: cursor_item.timestamp,
                after_id: cursor_item.id,
            })
        } else {
            None
        };
        matched.truncate(limit);
        Ok(QueryPage {
            items: matched,
            next_continuation,
        })
    }

    async fn update_alert_observation(&self, update: AlertObservationUpdate) -> StoreResult<bool> {
        let mut guard = self.alerts.write().await;
        match guard.iter_mut().find(|a| a.id == update.id) {
            Some(alert) => {
                alert.observed = update.observed;
                alert.timestamp = update.timestamp;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn prune(&self, older_than: DateTime<Utc>) -> StoreResult<u64> {
        let mut removed = 0u64;
        {
            let mut guard = self.entries.write().await;
            let before = guard.len();
            guard.retain(|e| e.timestamp >= older_than);
            removed += (before - guard.len()) as u64;
        }
        {
            let mut guard = self.alerts.write().await;
            let before = guard.len();
            guard.retain(|a| a.timestamp >= older_than);
            removed += (before - guard.len()) as u64;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use signalhub_core::Level;
    use std::collections::BTreeMap;

    fn log_at(offset_secs: i64) -> Entry {
        let ts = Utc::now() + Duration::seconds(offset_secs);
        Entry::new_log(ts, "app", "api", Level::Info, "hi", BTreeMap::new(), None, None).unwrap()
    }

    #[tokio::test]
    async fn append_then_query_round_trips() {
        let store = MemoryStore::new();
        let e = log_at(0);
        store.append(vec![e.clone()]).await.unwrap();

        let range = TimeRange {
            start: Utc::now() - Duration::minutes(1),
            end: Utc::now() + Duration::minutes(1),
        };
        let page = store
            .query(QueryFilter::default(), range, 10, Order::Ascending, None)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0], e);
    }

    #[tokio::test]
    async fn query_paginates_in_timestamp_id_order() {
        let store = MemoryStore::new();
        let entries: Vec<Entry> = (0..5).map(log_at).collect();
        store.append(entries.clone()).await.unwrap();

        let range = TimeRange {
            start: Utc::now() - Duration::minutes(1),
            end: Utc::now() + Duration::minutes(1),
        };
        let first = store
            .query(QueryFilter::default(), range, 2, Order::Ascending, None)
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.next_continuation.is_some());

        let second = store
            .query(
                QueryFilter::default(),
                range,
                2,
                Order::Ascending,
                first.next_continuation,
            )
            .await
            .unwrap();
        assert_eq!(second.items.len(), 2);
        assert_ne!(first.items, second.items);
    }

    #[tokio::test]
    async fn prune_removes_entries_older_than_cutoff() {
        let store = MemoryStore::new();
        store.append(vec![log_at(-3600)]).await.unwrap();
        store.append(vec![log_at(0)]).await.unwrap();

        let removed = store.prune(Utc::now() - Duration::minutes(1)).await.unwrap();
        assert_eq!(removed, 1);

        let range = TimeRange {
            start: Utc::now() - Duration::hours(2),
            end: Utc::now() + Duration::minutes(1),
        };
        let page = store
            .query(QueryFilter::default(), range, 10, Order::Ascending, None)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn update_alert_observation_mutates_the_stored_alert() {
        let store = MemoryStore::new();
        let alert = signalhub_core::Alert::new(
            "error_rate",
            signalhub_core::AlertLevel::Critical,
            Some(1.0),
            Some(0.5),
            "recurring_error",
            vec![],
            Utc::now(),
        );
        let id = alert.id;
        store.append_alerts(vec![alert]).await.unwrap();

        let new_ts = Utc::now() + Duration::seconds(5);
        let updated = store
            .update_alert_observation(AlertObservationUpdate {
                id,
                observed: Some(4.0),
                timestamp: new_ts,
            })
            .await
            .unwrap();
        assert!(updated);

        let range = TimeRange {
            start: Utc::now() - Duration::minutes(1),
            end: Utc::now() + Duration::minutes(1),
        };
        let page = store
            .query_alerts(AlertFilter::default(), range, 10, Order::Ascending, None)
            .await
            .unwrap();
        assert_eq!(page.items[0].observed, Some(4.0));
        assert_eq!(page.items[0].timestamp, new_ts);
    }

    #[tokio::test]
    async fn update_alert_observation_returns_false_for_unknown_id() {
        let store = MemoryStore::new();
        let updated = store
            .update_alert_observation(AlertObservationUpdate {
                id: uuid::Uuid::now_v7(),
                observed: Some(1.0),
                timestamp: Utc::now(),
            })
            .await
            .unwrap();
        assert!(!updated);
    }
}
