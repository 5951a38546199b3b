//! Apache Common/Combined log line parsers (spec §4.J), grounded in
//! `context_aware_log_parser.py`'s `LogFormatDetector.format_patterns`
//! regexes, ported to the `regex` crate.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use signalhub_core::{Entry, Level};
use std::collections::BTreeMap;

use crate::error::{ParseError, ParseResult};
use crate::parser::LineParser;

static COMMON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+) \S+ \S+ \[([^\]]+)\] "([^"]*)" (\d+) (\S+)"#).expect("valid regex")
});

static COMBINED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+) \S+ \S+ \[([^\]]+)\] "([^"]*)" (\d+) (\S+) "([^"]*)" "([^"]*)""#)
        .expect("valid regex")
});

/// Maps an HTTP status code to a [`Level`], carried from
/// `ApacheLogParser._status_to_level`: 5xx -> error, 4xx -> warn, 3xx ->
/// info, everything else -> info.
pub fn status_to_level(status: u16) -> Level {
    match status {
        500..=599 => Level::Error,
        400..=499 => Level::Warn,
        _ => Level::Info,
    }
}

fn parse_apache_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%d/%b/%Y:%H:%M:%S %z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub struct ApacheCommonParser;

impl LineParser for ApacheCommonParser {
    fn format_tag(&self) -> &'static str {
        "apache_common"
    }

    fn confidence(&self, line: &str) -> f64 {
        if COMMON_RE.is_match(line) {
            0.8
        } else {
            0.0
        }
    }

    fn parse(&self, line: &str, source: &str, component: &str) -> ParseResult<Entry> {
        let caps = COMMON_RE.captures(line).ok_or(ParseError::NoMatch {
            format: self.format_tag(),
        })?;
        let host = &caps[1];
        let ts_raw = &caps[2];
        let request = &caps[3];
        let status: u16 = caps[4].parse().map_err(|_| ParseError::MalformedField {
            format: self.format_tag(),
            detail: "status code".to_string(),
        })?;
        let bytes = &caps[5];

        let timestamp = parse_apache_timestamp(ts_raw).unwrap_or_else(Utc::now);
        let mut tags = BTreeMap::new();
        tags.insert("client_ip".to_string(), host.to_string());
        tags.insert("status".to_string(), status.to_string());
        tags.insert("bytes".to_string(), bytes.to_string());

        Entry::new_log(
            timestamp,
            source,
            component,
            status_to_level(status),
            format!("{request} {status}"),
            tags,
            None,
            Some(line.to_string()),
        )
        .map_err(|e| ParseError::MalformedField {
            format: self.format_tag(),
            detail: e.to_string(),
        })
    }
}

pub struct ApacheCombinedParser;

impl LineParser for ApacheCombinedParser {
    fn format_tag(&self) -> &'static str {
        "apache_combined"
    }

    fn confidence(&self, line: &str) -> f64 {
        if COMBINED_RE.is_match(line) {
            // Strictly more specific than Common, so it wins autodetection
            // when both match.
            0.9
        } else {
            0.0
        }
    }

    fn parse(&self, line: &str, source: &str, component: &str) -> ParseResult<Entry> {
        let caps = COMBINED_RE.captures(line).ok_or(ParseError::NoMatch {
            format: self.format_tag(),
        })?;
        let host = &caps[1];
        let ts_raw = &caps[2];
        let request = &caps[3];
        let status: u16 = caps[4].parse().map_err(|_| ParseError::MalformedField {
            format: self.format_tag(),
            detail: "status code".to_string(),
        })?;
        let bytes = &caps[5];
        let referer = &caps[6];
        let user_agent = &caps[7];

        let timestamp = parse_apache_timestamp(ts_raw).unwrap_or_else(Utc::now);
        let mut tags = BTreeMap::new();
        tags.insert("client_ip".to_string(), host.to_string());
        tags.insert("status".to_string(), status.to_string());
        tags.insert("bytes".to_string(), bytes.to_string());
        tags.insert("referer".to_string(), referer.to_string());
        tags.insert("user_agent".to_string(), user_agent.to_string());

        Entry::new_log(
            timestamp,
            source,
            component,
            status_to_level(status),
            format!("{request} {status}"),
            tags,
            None,
            Some(line.to_string()),
        )
        .map_err(|e| ParseError::MalformedField {
            format: self.format_tag(),
            detail: e.to_string(),
        })
    }
}
