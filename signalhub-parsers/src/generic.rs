//! Generic timestamp-and-level fallback parser (spec §4.J). The parser of
//! last resort: any registered-format miss falls through to this one
//! during autodetection, and it never itself fails — an unparseable line
//! becomes an `unknown`-level Entry with `message=raw_line` per spec.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use signalhub_core::{Entry, Level};
use std::collections::BTreeMap;

use crate::error::ParseResult;
use crate::parser::LineParser;

static TIMESTAMP_LEVEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?)\s+\[?(\w+)\]?\s*[:-]?\s*(.*)$",
    )
    .expect("valid regex")
});

pub struct GenericParser;

impl LineParser for GenericParser {
    fn format_tag(&self) -> &'static str {
        "generic"
    }

    fn confidence(&self, line: &str) -> f64 {
        if TIMESTAMP_LEVEL_RE.is_match(line) {
            0.4
        } else {
            0.05
        }
    }

    /// Never returns `Err`: this is the format-of-last-resort. A line with
    /// no recognizable timestamp/level prefix becomes `level=unknown,
    /// message=raw_line` (spec §4.J).
    fn parse(&self, line: &str, source: &str, component: &str) -> ParseResult<Entry> {
        let (timestamp, level, message) = match TIMESTAMP_LEVEL_RE.captures(line) {
            Some(caps) => {
                let ts_raw = &caps[1];
                let timestamp = parse_loose_timestamp(ts_raw).unwrap_or_else(Utc::now);
                let level = Level::normalize(&caps[2]);
                (timestamp, level, caps[3].to_string())
            }
            None => (Utc::now(), Level::Unknown, line.to_string()),
        };

        Ok(Entry::new_log(
            timestamp,
            source,
            component,
            level,
            message,
            BTreeMap::new(),
            None,
            Some(line.to_string()),
        )
        .unwrap_or_else(|_| {
            Entry::new_log(
                Utc::now(),
                source,
                component,
                Level::Unknown,
                line.to_string(),
                BTreeMap::new(),
                None,
                Some(line.to_string()),
            )
            .expect("fallback construction with non-empty source/component cannot fail")
        }))
    }
}

fn parse_loose_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timestamp_and_level_prefix() {
        let line = "2024-01-15T10:30:00.123Z ERROR: connection refused";
        let parser = GenericParser;
        let entry = parser.parse(line, "application", "api").unwrap();
        assert_eq!(entry.kind.level(), Some(Level::Error));
    }

    #[test]
    fn never_fails_on_unrecognizable_text() {
        let parser = GenericParser;
        let entry = parser.parse("just some free text", "application", "api").unwrap();
        assert_eq!(entry.kind.level(), Some(Level::Unknown));
    }
}
