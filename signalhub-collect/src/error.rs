use thiserror::Error;

/// Errors raised by a [`crate::Collector`]'s `poll()` (spec §7
/// `CollectorError`). Handled entirely by the collector's state machine;
/// never propagated to clients.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CollectorError {
    #[error("collector {0} is not active")]
    NotActive(String),

    #[error("probe failed: {0}")]
    ProbeFailed(String),

    #[error("poll exceeded its configured interval and returned partial results")]
    TimedOut,

    #[error("collector is in the Error state and must be reset before it can poll again")]
    InErrorState,
}

pub type CollectorResult<T> = std::result::Result<T, CollectorError>;
