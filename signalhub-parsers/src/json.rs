//! JSON log-line parser (spec §4.J): each line is a standalone JSON object,
//! parsed via `serde_json` and mapped onto [`Entry`] through a small set of
//! common key aliases (`message`/`msg`, `level`/`severity`, `timestamp`/
//! `time`/`ts`), falling back per spec on error.

use chrono::{DateTime, Utc};
use serde_json::Value;
use signalhub_core::{Entry, Level, MetricType};
use std::collections::BTreeMap;

use crate::error::{ParseError, ParseResult};
use crate::parser::LineParser;

pub struct JsonParser;

fn first_str<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k)).and_then(Value::as_str)
}

fn extract_timestamp(obj: &Value) -> Option<DateTime<Utc>> {
    let raw = first_str(obj, &["timestamp", "time", "ts", "@timestamp"])?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn extract_metric_type(obj: &Value) -> Option<MetricType> {
    match first_str(obj, &["metric_type"])? {
        "counter" => Some(MetricType::Counter),
        "gauge" => Some(MetricType::Gauge),
        "histogram" => Some(MetricType::Histogram),
        "summary" => Some(MetricType::Summary),
        "timing" => Some(MetricType::Timing),
        _ => None,
    }
}

fn extract_tags(obj: &Value) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    if let Some(Value::Object(map)) = obj.get("tags") {
        for (k, v) in map {
            if let Some(s) = v.as_str() {
                tags.insert(k.clone(), s.to_string());
            } else {
                tags.insert(k.clone(), v.to_string());
            }
        }
    }
    tags
}

impl LineParser for JsonParser {
    fn format_tag(&self) -> &'static str {
        "json"
    }

    fn confidence(&self, line: &str) -> f64 {
        let trimmed = line.trim();
        if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
            return 0.0;
        }
        if serde_json::from_str::<Value>(trimmed).is_ok() {
            0.95
        } else {
            0.0
        }
    }

    fn parse(&self, line: &str, source: &str, component: &str) -> ParseResult<Entry> {
        let value: Value = serde_json::from_str(line.trim()).map_err(|e| ParseError::MalformedField {
            format: self.format_tag(),
            detail: e.to_string(),
        })?;
        let obj = value.as_object().ok_or(ParseError::NoMatch {
            format: self.format_tag(),
        })?;
        let value = Value::Object(obj.clone());

        let timestamp = extract_timestamp(&value).unwrap_or_else(Utc::now);
        let tags = extract_tags(&value);
        let source = first_str(&value, &["source"]).unwrap_or(source).to_string();
        let component = first_str(&value, &["component", "host", "service"])
            .unwrap_or(component)
            .to_string();
        let correlation_id = first_str(&value, &["correlation_id", "trace_id"]).map(str::to_string);

        if let Some(metric_name) = first_str(&value, &["metric_name", "metric"]) {
            let metric_value = value
                .get("value")
                .and_then(Value::as_f64)
                .ok_or_else(|| ParseError::MalformedField {
                    format: self.format_tag(),
                    detail: "metric entries require a numeric value".to_string(),
                })?;
            let unit = first_str(&value, &["unit"]).map(str::to_string);
            let metric_type = extract_metric_type(&value);
            return Entry::new_metric(timestamp, source, component, metric_name, metric_value, unit, tags)
                .map(|entry| match metric_type {
                    Some(t) => entry.with_metric_type(t),
                    None => entry,
                })
                .map_err(|e| ParseError::MalformedField {
                    format: self.format_tag(),
                    detail: e.to_string(),
                });
        }

        let level = first_str(&value, &["level", "severity", "loglevel"])
            .map(Level::normalize)
            .unwrap_or(Level::Unknown);
        let message = first_str(&value, &["message", "msg", "text"])
            .map(str::to_string)
            .unwrap_or_else(|| line.to_string());

        Entry::new_log(
            timestamp,
            source,
            component,
            level,
            message,
            tags,
            correlation_id,
            Some(line.to_string()),
        )
        .map_err(|e| ParseError::MalformedField {
            format: self.format_tag(),
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_log_line() {
        let line = r#"{"level":"error","message":"boom","component":"api"}"#;
        let parser = JsonParser;
        assert!(parser.confidence(line) > 0.0);
        let entry = parser.parse(line, "application", "default").unwrap();
        assert_eq!(entry.component, "api");
    }

    #[test]
    fn parses_json_metric_line() {
        let line = r#"{"metric_name":"cpu_percent","value":42.5,"unit":"percent"}"#;
        let parser = JsonParser;
        let entry = parser.parse(line, "system", "host-01").unwrap();
        assert!(entry.kind.is_metric());
    }

    #[test]
    fn parses_metric_type_hint_when_present() {
        let line = r#"{"metric_name":"cpu_percent","value":42.5,"metric_type":"gauge"}"#;
        let parser = JsonParser;
        let entry = parser.parse(line, "system", "host-01").unwrap();
        assert_eq!(entry.metric_type(), Some(MetricType::Gauge));
    }

    #[test]
    fn metric_type_absent_when_not_supplied() {
        let line = r#"{"metric_name":"cpu_percent","value":42.5}"#;
        let parser = JsonParser;
        let entry = parser.parse(line, "system", "host-01").unwrap();
        assert_eq!(entry.metric_type(), None);
    }

    #[test]
    fn non_json_has_zero_confidence() {
        let parser = JsonParser;
        assert_eq!(parser.confidence("plain text line"), 0.0);
    }
}
