use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use signalhub_core::{Alert, AlertLevel, AlertObservationUpdate, Entry, QueryFilter, TimeRange};

use crate::continuation::Continuation;
use crate::error::StoreResult;

/// Filter for `query_alerts`, the symmetric counterpart of [`QueryFilter`]
/// (spec §6.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertFilter {
    #[serde(default)]
    pub metric_or_event: Vec<String>,
    #[serde(default)]
    pub level_min: Option<AlertLevel>,
    #[serde(default)]
    pub reason_contains: Option<String>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        if !self.metric_or_event.is_empty()
            && !self
                .metric_or_event
                .iter()
                .any(|m| m == &alert.metric_or_event)
        {
            return false;
        }
        if let Some(floor) = self.level_min {
            if alert_level_rank(alert.level) < alert_level_rank(floor) {
                return false;
            }
        }
        if let Some(needle) = &self.reason_contains {
            if !alert.reason.contains(needle.as_str()) {
                return false;
            }
        }
        true
    }
}

fn alert_level_rank(level: AlertLevel) -> u8 {
    match level {
        AlertLevel::Info => 0,
        AlertLevel::Warning => 1,
        AlertLevel::Critical => 2,
        AlertLevel::Emergency => 3,
    }
}

/// Sort order for `query`/`query_alerts` (spec §4.B); both orderings are
/// stable on the secondary `id` key so ties never reorder between pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Ascending,
    Descending,
}

/// One page of a paginated query result.
#[derive(Debug, Clone)]
pub struct QueryPage<T> {
    pub items: Vec<T>,
    pub next_continuation: Option<Continuation>,
}

/// The persistence contract (spec §4.B). Implementations provide a
/// write-ahead append path plus consistent-snapshot range queries; callers
/// never observe a partial batch.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Atomic per batch with respect to readers; durable before returning
    /// success.
    async fn append(&self, batch: Vec<Entry>) -> StoreResult<()>;

    /// Returns a consistent snapshot as of query start, paginated via a
    /// continuation token.
    async fn query(
        &self,
        filter: QueryFilter,
        range: TimeRange,
        limit: usize,
        order: Order,
        continuation: Option<Continuation>,
    ) -> StoreResult<QueryPage<Entry>>;

    async fn append_alerts(&self, batch: Vec<Alert>) -> StoreResult<()>;

    /// Applies a cool-down revision to an already-persisted [`Alert`] (spec
    /// Glossary, Cool-down). Returns `false` if `update.id` isn't found,
    /// which a caller treats the same as a store that never saw the
    /// original alert — log and move on, never panic.
    async fn update_alert_observation(&self, update: AlertObservationUpdate) -> StoreResult<bool>;

    async fn query_alerts(
        &self,
        filter: AlertFilter,
        range: TimeRange,
        limit: usize,
        order: Order,
        continuation: Option<Continuation>,
    ) -> StoreResult<QueryPage<Alert>>;

    /// May run at any time; must not block appends for more than a bounded
    /// interval. Returns the number of entries+alerts removed.
    async fn prune(&self, older_than: chrono::DateTime<chrono::Utc>) -> StoreResult<u64>;
}
