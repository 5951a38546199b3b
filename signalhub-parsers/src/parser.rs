use signalhub_core::Entry;

use crate::error::ParseResult;

/// A stateless `string -> Entry | ParseError` parser (spec §4.J). Built-ins
/// are pure functions with no shared state, the capability-set shape
/// spec §9 prescribes in place of a class hierarchy.
pub trait LineParser: Send + Sync {
    /// The format tag this parser is registered under (e.g. `"apache_common"`).
    fn format_tag(&self) -> &'static str;

    /// A match-confidence score in `[0.0, 1.0]` used by autodetection
    /// (spec §4.J: "probe each registered parser against the first line;
    /// choose the one with the best match confidence"). A parser that does
    /// not recognize the line at all should return `0.0`.
    fn confidence(&self, line: &str) -> f64;

    /// Parses one line into an Entry, stamping `source`/`component` and
    /// preserving the original text in `raw`.
    fn parse(&self, line: &str, source: &str, component: &str) -> ParseResult<Entry>;
}
