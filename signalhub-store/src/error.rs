use signalhub_core::{Alert, Entry};
use thiserror::Error;

/// Errors from the persistence layer (spec §7 `StoreError`).
///
/// Append failures carry the rejected batch back to the caller so it can
/// decide to requeue (the Collector Pool retries with exponential backoff)
/// or drop it; query failures are always safe to retry.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid continuation token")]
    InvalidContinuation,

    #[error("store is closed")]
    Closed,

    #[error("append rejected: {reason}")]
    AppendEntriesRejected { reason: String, rejected: Vec<Entry> },

    #[error("append rejected: {reason}")]
    AppendAlertsRejected { reason: String, rejected: Vec<Alert> },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
