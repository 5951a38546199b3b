//! Syslog (RFC 3164 subset) parser (spec §4.J), grounded in
//! `context_aware_log_parser.py`'s `SyslogParser`, which defaults the level
//! to `INFO` (syslog carries no severity outside a facility/priority
//! prefix this subset does not parse).

use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use signalhub_core::{Entry, Level};
use std::collections::BTreeMap;

use crate::error::{ParseError, ParseResult};
use crate::parser::LineParser;

static SYSLOG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}) (\S+) (\S+?)(?:\[(\d+)\])?: (.*)$")
        .expect("valid regex")
});

pub struct SyslogParser;

impl LineParser for SyslogParser {
    fn format_tag(&self) -> &'static str {
        "syslog"
    }

    fn confidence(&self, line: &str) -> f64 {
        if SYSLOG_RE.is_match(line) {
            0.7
        } else {
            0.0
        }
    }

    fn parse(&self, line: &str, source: &str, component: &str) -> ParseResult<Entry> {
        let caps = SYSLOG_RE.captures(line).ok_or(ParseError::NoMatch {
            format: self.format_tag(),
        })?;
        let ts_raw = &caps[1];
        let hostname = &caps[2];
        let tag = &caps[3];
        let pid = caps.get(4).map(|m| m.as_str());
        let message = &caps[5];

        // RFC 3164 timestamps carry no year; assume the current one. A
        // producer whose log rolled over Dec 31 -> Jan 1 within the skew
        // tolerance is handled by the ingestion boundary's skew check, not
        // here.
        let year = Utc::now().year();
        let timestamp = chrono::NaiveDateTime::parse_from_str(
            &format!("{year} {ts_raw}"),
            "%Y %b %e %H:%M:%S",
        )
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now());

        let mut tags = BTreeMap::new();
        tags.insert("hostname".to_string(), hostname.to_string());
        tags.insert("tag".to_string(), tag.to_string());
        if let Some(pid) = pid {
            tags.insert("pid".to_string(), pid.to_string());
        }

        Entry::new_log(
            timestamp,
            source,
            component,
            Level::Info,
            message.to_string(),
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
