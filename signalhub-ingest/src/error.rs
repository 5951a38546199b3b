use thiserror::Error;

/// Errors from the Ingestion Bus (spec §4.E).
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum IngestError {
    #[error("ingestion bus is closed")]
    Closed,
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
