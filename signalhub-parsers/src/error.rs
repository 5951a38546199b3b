use thiserror::Error;

/// Raw-line parsing failure (spec §7 `ParseError`). The raw line is
/// retained as an `unknown`-level Entry by the generic fallback rather than
/// surfaced as a hard failure, unless the caller explicitly asked for
/// strict per-line reporting (see `submit_raw` in signalhub-server).
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("line did not match the {format} format")]
    NoMatch { format: &'static str },

    #[error("line matched {format} but a field could not be parsed: {detail}")]
    MalformedField { format: &'static str, detail: String },

    #[error("no parser registered for format tag {0:?}")]
    UnknownFormat(String),

    #[error("autodetection could not find a confident parser for this line")]
    DetectionFailed,
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;
