//! Nginx access-log parser (spec §4.J).

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use signalhub_core::Entry;
use std::collections::BTreeMap;

use crate::apache::status_to_level;
use crate::error::{ParseError, ParseResult};
use crate::parser::LineParser;

static NGINX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+) - (\S+) \[([^\]]+)\] "([^"]*)" (\d+) (\d+) "([^"]*)" "([^"]*)""#)
        .expect("valid regex")
});

pub struct NginxParser;

impl LineParser for NginxParser {
    fn format_tag(&self) -> &'static str {
        "nginx"
    }

    fn confidence(&self, line: &str) -> f64 {
        if NGINX_RE.is_match(line) {
            0.85
        } else {
            0.0
        }
    }

    fn parse(&self, line: &str, source: &str, component: &str) -> ParseResult<Entry> {
        let caps = NGINX_RE.captures(line).ok_or(ParseError::NoMatch {
            format: self.format_tag(),
        })?;
        let remote_addr = &caps[1];
        let remote_user = &caps[2];
        let ts_raw = &caps[3];
        let request = &caps[4];
        let status: u16 = caps[5].parse().map_err(|_| ParseError::MalformedField {
            format: self.format_tag(),
            detail: "status code".to_string(),
        })?;
        let bytes = &caps[6];
        let referer = &caps[7];
        let user_agent = &caps[8];

        let timestamp = chrono::DateTime::parse_from_str(ts_raw, "%d/%b/%Y:%H:%M:%S %z")
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let mut tags = BTreeMap::new();
        tags.insert("client_ip".to_string(), remote_addr.to_string());
        tags.insert("remote_user".to_string(), remote_user.to_string());
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
