use thiserror::Error;

/// Errors raised while constructing or validating an [`crate::Entry`].
///
/// Surfaced synchronously to the submitter (`§7 ValidationError`); no retry
/// is useful for these.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("source must not be empty")]
    EmptySource,

    #[error("component must not be empty")]
    EmptyComponent,

    #[error("metric_name must not be empty")]
    EmptyMetricName,

    #[error("metric value must be finite, got {0}")]
    NonFiniteValue(f64),

    #[error("timestamp {timestamp} is {skew_ms}ms ahead of now, exceeding the {tolerance_ms}ms skew tolerance")]
    TimestampTooFarInFuture {
        timestamp: chrono::DateTime<chrono::Utc>,
        skew_ms: i64,
        tolerance_ms: i64,
    },

    #[error("tag key must not be empty")]
    EmptyTagKey,
}

/// Result alias for entry/alert construction.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
