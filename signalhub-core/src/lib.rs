//! # signalhub-core
//!
//! The normalized data model shared by every stage of the ingestion →
//! storage → fanout → analytics pipeline: [`Entry`], [`Alert`], the
//! [`QueryFilter`]/[`TimeRange`] pair used by queries and subscriptions, and
//! the [`ValidationError`] taxonomy raised when invariants are violated.
//!
//! Nothing in this crate talks to a channel, a socket, or a disk — it is
//! pure data plus the rules for constructing it, so every other crate in
//! the workspace can depend on it without pulling in tokio.

mod alert;
mod entry;
mod error;
mod filter;
mod level;
pub mod metrics_util;

pub use alert::{Alert, AlertEvent, AlertKind, AlertLevel, AlertObservationUpdate, CascadeImpact};
pub use entry::{check_timestamp_skew, Entry, EntryKind, MetricType};
pub use error::{ValidationError, ValidationResult};
pub use filter::{QueryFilter, TimeRange};
pub use level::Level;
