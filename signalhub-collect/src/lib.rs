//! Collector sources (spec §4.C) and the Collector Pool that schedules
//! them and feeds their output into the Ingestion Bus.

mod application;
mod collector;
mod container;
mod database;
mod error;
mod logfile;
mod metrics;
mod pool;
mod state;
mod system;

pub use application::{ApplicationCollector, ApplicationCollectorConfig};
pub use collector::{Collector, CollectorKind, CollectorStatus};
pub use container::{ContainerCollector, ContainerCollectorConfig};
pub use database::{
    DatabaseCollector, DatabaseCollectorConfig, DatabaseInstanceConfig, DatabaseInstanceKind,
};
pub use error::{CollectorError, CollectorResult};
pub use logfile::{LogFileCollector, LogFileCollectorConfig};
pub use pool::CollectorPool;
pub use state::CollectorState;
pub use system::{SystemCollector, SystemCollectorConfig};
