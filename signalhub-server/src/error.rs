//! Maps the error taxonomy of spec §7 onto stable JSON-RPC numeric codes.
//! Codes below -32000 are this server's own (outside the JSON-RPC-reserved
//! range), grouped by the error kind named in §7 so a client can branch on
//! `code` without string-matching `message`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Validation(#[from] signalhub_core::ValidationError),
    #[error(transparent)]
    Parse(#[from] signalhub_parsers::ParseError),
    #[error(transparent)]
    Store(#[from] signalhub_store::StoreError),
    #[error(transparent)]
    Ingest(#[from] signalhub_ingest::IngestError),
    #[error(transparent)]
    Filter(#[from] signalhub_fanout::FilterError),
    #[error("system is draining")]
    ShuttingDown,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ServerError {
    /// Stable numeric code (spec §7: "a stable numeric code and a human
    /// message").
    pub fn code(&self) -> i64 {
        match self {
            ServerError::Validation(_) => -32001,
            ServerError::Parse(_) => -32002,
            ServerError::Store(_) => -32003,
            ServerError::Ingest(_) => -32004,
            ServerError::Filter(_) => -32005,
            ServerError::ShuttingDown => -32006,
            ServerError::InvalidRequest(_) => -32600,
        }
    }
}
