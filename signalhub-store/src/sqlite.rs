//! SQLite-backed `EntryStore`.
//!
//! A write-ahead append log keyed by insertion order (spec §4.B), with
//! secondary indexes on `(timestamp)`, `(source, timestamp)`,
//! `(component, timestamp)`, and `(metric_name, timestamp)`. Coarse
//! filtering (source/component/metric/time-range) happens in SQL against
//! those indexes; the remaining predicates (tag equality, text search,
//! level floor) are evaluated in Rust against the deserialized row, the
//! same two-stage shape `dashflow-streaming`'s backends use to keep the SQL
//! layer simple while still pruning most of the scan in the database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use signalhub_core::{Alert, AlertObservationUpdate, Entry, QueryFilter, TimeRange};
use tokio::sync::Mutex;

use crate::continuation::Continuation;
use crate::error::{StoreError, StoreResult};
use crate::traits::{AlertFilter, EntryStore, Order, QueryPage};

const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed, WAL-mode implementation of [`EntryStore`]. One writer
/// connection is shared behind a mutex (spec §4.B: "writer serializes
/// batches"); queries open a fresh read-only connection, which WAL mode
/// allows to proceed without blocking on the writer.
pub struct SqliteStore {
    path: PathBuf,
    writer: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<SqliteStore> {
        let path = path.as_ref().to_path_buf();
        let init_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            let conn = Connection::open(&init_path)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.execute_batch(SCHEMA_SQL)?;
            conn.execute(
                "INSERT OR IGNORE INTO metadata(key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(SqliteStore {
            path,
            writer: Arc::new(Mutex::new(conn)),
        })
    }

    fn open_reader(&self) -> StoreResult<Connection> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    timestamp_us INTEGER NOT NULL,
    source TEXT NOT NULL,
    component TEXT NOT NULL,
    metric_name TEXT,
    payload TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entries_ts ON entries(timestamp_us, id);
CREATE INDEX IF NOT EXISTS idx_entries_source ON entries(source, timestamp_us);
CREATE INDEX IF NOT EXISTS idx_entries_component ON entries(component, timestamp_us);
CREATE INDEX IF NOT EXISTS idx_entries_metric ON entries(metric_name, timestamp_us);

CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY,
    timestamp_us INTEGER NOT NULL,
    metric_or_event TEXT NOT NULL,
    payload TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alerts_ts ON alerts(timestamp_us, id);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

fn entry_row(entry: &Entry) -> StoreResult<(String, i64, String, String, Option<String>, String)> {
    let payload = serde_json::to_string(entry).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let metric_name = match &entry.kind {
        signalhub_core::EntryKind::Metric { metric_name, .. } => Some(metric_name.clone()),
        signalhub_core::EntryKind::Log { .. } => None,
    };
    Ok((
        entry.id.to_string(),
        entry.timestamp.timestamp_micros(),
        entry.source.clone(),
        entry.component.clone(),
        metric_name,
        payload,
    ))
}

#[async_trait]
impl EntryStore for SqliteStore {
    async fn append(&self, batch: Vec<Entry>) -> StoreResult<()> {
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            let mut conn = futures::executor::block_on(writer.lock());
            let tx = conn
                .transaction()
                .map_err(|e| StoreError::Database(e.to_string()))?;
            for entry in &batch {
                let (id, ts, source, component, metric_name, payload) = entry_row(entry)?;
                tx.execute(
                    "INSERT OR IGNORE INTO entries(id, timestamp_us, source, component, metric_name, payload) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![id, ts, source, component, metric_name, payload],
                )
                .map_err(|e| StoreError::Database(e.to_string()))?;
            }
            tx.commit().map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
    }

    async fn query(
        &self,
        filter: QueryFilter,
        range: TimeRange,
        limit: usize,
        order: Order,
        continuation: Option<Continuation>,
    ) -> StoreResult<QueryPage<Entry>> {
        let conn = self.open_reader()?;
        let limit = limit.max(1);

        let mut sql = String::from(
            "SELECT payload FROM entries WHERE timestamp_us >= ?1 AND timestamp_us < ?2",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(range.start.timestamp_micros()),
            Box::new(range.end.timestamp_micros()),
        ];
        if filter.sources.len() == 1 {
            sql.push_str(&format!(" AND source = ?{}", args.len() + 1));
            args.push(Box::new(filter.sources[0].clone()));
        }
        if filter.components.len() == 1 {
            sql.push_str(&format!(" AND component = ?{}", args.len() + 1));
            args.push(Box::new(filter.components[0].clone()));
        }
        if filter.metric_names.len() == 1 {
            sql.push_str(&format!(" AND metric_name = ?{}", args.len() + 1));
            args.push(Box::new(filter.metric_names[0].clone()));
        }
        sql.push_str(" ORDER BY timestamp_us ASC, id ASC");

        let mut stmt = conn.prepare(&sql).map_err(|e| StoreError::Database(e.to_string()))?;
        let arg_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(arg_refs.as_slice(), |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut matched = Vec::new();
        for row in rows {
            let payload = row.map_err(|e| StoreError::Database(e.to_string()))?;
            let entry: Entry =
                serde_json::from_str(&payload).map_err(|e| StoreError::Serialization(e.to_string()))?;
            if filter.matches(&entry) {
                matched.push(entry);
            }
        }

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

    async fn append_alerts(&self, batch: Vec<Alert>) -> StoreResult<()> {
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            let mut conn = futures::executor::block_on(writer.lock());
            let tx = conn
                .transaction()
                .map_err(|e| StoreError::Database(e.to_string()))?;
            for alert in &batch {
                let payload =
                    serde_json::to_string(alert).map_err(|e| StoreError::Serialization(e.to_string()))?;
                tx.execute(
                    "INSERT OR IGNORE INTO alerts(id, timestamp_us, metric_or_event, payload) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        alert.id.to_string(),
                        alert.timestamp.timestamp_micros(),
                        alert.metric_or_event,
                        payload
                    ],
                )
                .map_err(|e| StoreError::Database(e.to_string()))?;
            }
            tx.commit().map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
    }

    async fn query_alerts(
        &self,
        filter: AlertFilter,
        range: TimeRange,
        limit: usize,
        order: Order,
        continuation: Option<Continuation>,
    ) -> StoreResult<QueryPage<Alert>> {
        let conn = self.open_reader()?;
        let limit = limit.max(1);

        let mut stmt = conn
            .prepare(
                "SELECT payload FROM alerts WHERE timestamp_us >= ?1 AND timestamp_us < ?2 ORDER BY timestamp_us ASC, id ASC",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(
                params![range.start.timestamp_micros(), range.end.timestamp_micros()],
                |row| row.get::<_, String>(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut matched = Vec::new();
        for row in rows {
            let payload = row.map_err(|e| StoreError::Database(e.to_string()))?;
            let alert: Alert =
                serde_json::from_str(&payload).map_err(|e| StoreError::Serialization(e.to_string()))?;
            if filter.matches(&alert) {
                matched.push(alert);
            }
        }

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
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<bool> {
            let conn = futures::executor::block_on(writer.lock());
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload FROM alerts WHERE id = ?1",
                    params![update.id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StoreError::Database(e.to_string()))?;
            let Some(payload) = payload else { return Ok(false) };
            let mut alert: Alert =
                serde_json::from_str(&payload).map_err(|e| StoreError::Serialization(e.to_string()))?;
            alert.observed = update.observed;
            alert.timestamp = update.timestamp;
            let payload =
                serde_json::to_string(&alert).map_err(|e| StoreError::Serialization(e.to_string()))?;
            conn.execute(
                "UPDATE alerts SET payload = ?1, timestamp_us = ?2 WHERE id = ?3",
                params![payload, alert.timestamp.timestamp_micros(), alert.id.to_string()],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(true)
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
    }

    async fn prune(&self, older_than: DateTime<Utc>) -> StoreResult<u64> {
        let writer = self.writer.clone();
        let cutoff = older_than.timestamp_micros();
        tokio::task::spawn_blocking(move || -> StoreResult<u64> {
            let conn = futures::executor::block_on(writer.lock());
            let entries_removed = conn
                .execute("DELETE FROM entries WHERE timestamp_us < ?1", params![cutoff])
                .map_err(|e| StoreError::Database(e.to_string()))?;
            let alerts_removed = conn
                .execute("DELETE FROM alerts WHERE timestamp_us < ?1", params![cutoff])
                .map_err(|e| StoreError::Database(e.to_string()))?;
            Ok((entries_removed + alerts_removed) as u64)
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
    }
}
