//! Ingestion pipeline (spec §4.E/§4.F): the bounded Ingestion Bus that
//! absorbs bursty producer traffic, and the Enricher that normalizes every
//! Entry before it reaches the Analyzer, Store, and Fanout Hub.

mod bus;
mod enricher;
mod error;
mod metrics;

pub use bus::{BusConfig, IngestionBus, OverflowPolicy};
pub use enricher::{enrich, Enricher, EnricherConfig, DEFAULT_MAX_MESSAGE_BYTES};
pub use error::{IngestError, IngestResult};
