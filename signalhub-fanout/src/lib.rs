//! # signalhub-fanout
//!
//! The Fanout Hub (spec §4.H): maintains the subscriber set, evaluates
//! per-subscriber glob/level/tag filters, and delivers Entries and Alerts
//! with a drop-on-slow overflow policy. Transport-agnostic — the Server
//! crate supplies the WebSocket [`Transport`] implementation.

mod filter;
mod hub;
mod metrics;
mod subscriber;
mod transport;

pub use filter::{CompiledFilter, FilterError, SubscriptionSpec};
pub use hub::{FanoutHub, SubscriberStats};
pub use subscriber::{DropCounter, Subscriber, DEFAULT_QUEUE_CAPACITY};
pub use transport::{PushFrame, Transport, TransportError};
