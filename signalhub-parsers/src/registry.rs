//! The Parser Registry (spec §4.J): a dispatch table from format tag to
//! parser, plus `format=auto` autodetection cached per `(source,
//! producer-session)` the way `context_aware_log_parser.py`'s
//! `LogFormatDetector` caches by content hash.

use dashmap::DashMap;
use signalhub_core::Entry;
use tracing::debug;

use crate::apache::{ApacheCombinedParser, ApacheCommonParser};
use crate::error::{ParseError, ParseResult};
use crate::generic::GenericParser;
use crate::json::JsonParser;
use crate::nginx::NginxParser;
use crate::parser::LineParser;
use crate::syslog::SyslogParser;

/// One outcome of a `submit_raw` batch: either a parsed Entry or a
/// per-line error (spec §6.2 `submit_raw`).
pub enum ParseOutcome {
    Parsed(Entry),
    Failed { line_index: usize, message: String },
}

pub struct ParserRegistry {
    parsers: Vec<Box<dyn LineParser>>,
    generic: GenericParser,
    /// Cache of the detected format tag per `(source, session)`, so a
    /// producer session need only be autodetected on its first line.
    detection_cache: DashMap<(String, String), &'static str>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ParserRegistry {
    /// Registers the five built-in parsers (spec §4.J): Apache Common,
    /// Apache Combined, Nginx, Syslog, and JSON. `generic` is always
    /// available as the autodetection fallback but is not itself in the
    /// ranked list, since it always matches with low confidence and would
    /// otherwise win ties against a parser that genuinely recognizes
    /// nothing.
    pub fn with_builtins() -> ParserRegistry {
        let parsers: Vec<Box<dyn LineParser>> = vec![
            Box::new(ApacheCombinedParser),
            Box::new(ApacheCommonParser),
            Box::new(NginxParser),
            Box::new(SyslogParser),
            Box::new(JsonParser),
        ];
        ParserRegistry {
            parsers,
            generic: GenericParser,
            detection_cache: DashMap::new(),
        }
    }

    pub fn register(&mut self, parser: Box<dyn LineParser>) {
        self.parsers.push(parser);
    }

    /// Parses a line using an explicit format tag.
    pub fn parse_with(
        &self,
        format: &str,
        line: &str,
        source: &str,
        component: &str,
    ) -> ParseResult<Entry> {
        if format == "generic" {
            return self.generic.parse(line, source, component);
        }
        self.parsers
            .iter()
            .find(|p| p.format_tag() == format)
            .ok_or_else(|| ParseError::UnknownFormat(format.to_string()))?
            .parse(line, source, component)
    }

    /// Parses a line with `format=auto`: probes every registered parser,
    /// picks the highest-confidence match, and caches the decision for
    /// subsequent lines from the same `(source, session)` pair.
    pub fn parse_auto(
        &self,
        line: &str,
        source: &str,
        component: &str,
        session: &str,
    ) -> ParseResult<Entry> {
        let cache_key = (source.to_string(), session.to_string());
        if let Some(cached) = self.detection_cache.get(&cache_key) {
            let tag = *cached;
            if let Ok(entry) = self.parse_with(tag, line, source, component) {
                return Ok(entry);
            }
            // The cached format stopped matching (producer switched
            // formats mid-session); fall through to full detection.
        }

        let best = self
            .parsers
            .iter()
            .map(|p| (p.format_tag(), p.confidence(line)))
            .filter(|(_, score)| *score > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1));

        match best {
            Some((tag, _)) => {
                debug!(source, session, format = tag, "parser autodetected");
                self.detection_cache.insert(cache_key, tag);
                self.parse_with(tag, line, source, component)
            }
            None => self.generic.parse(line, source, component),
        }
    }

    /// Implements `submit_raw` (spec §4.I/§6.2): applies `format` (or
    /// autodetection when `format == "auto"`) to each line, returning a
    /// per-line outcome so partial success is representable.
    pub fn parse_batch(
        &self,
        source: &str,
        component: &str,
        format: &str,
        lines: &[String],
        session: &str,
    ) -> Vec<ParseOutcome> {
        lines
            .iter()
            .enumerate()
            .map(|(line_index, line)| {
                let result = if format == "auto" {
                    self.parse_auto(line, source, component, session)
                } else {
                    self.parse_with(format, line, source, component)
                };
                match result {
                    Ok(entry) => ParseOutcome::Parsed(entry),
                    Err(e) => ParseOutcome::Failed {
                        line_index,
                        message: e.to_string(),
                    },
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autodetects_json_over_generic() {
        let registry = ParserRegistry::with_builtins();
        let line = r#"{"level":"warn","message":"disk nearly full"}"#;
        let entry = registry
            .parse_auto(line, "application", "api", "session-1")
            .unwrap();
        assert_eq!(entry.kind.level(), Some(signalhub_core::Level::Warn));
    }

    #[test]
    fn caches_detection_per_session() {
        let registry = ParserRegistry::with_builtins();
        let line = r#"{"level":"info","message":"ok"}"#;
        registry.parse_auto(line, "application", "api", "session-1").unwrap();
        assert_eq!(
            *registry
                .detection_cache
                .get(&("application".to_string(), "session-1".to_string()))
                .unwrap(),
            "json"
        );
    }

    #[test]
    fn unrecognized_line_falls_back_to_generic() {
        let registry = ParserRegistry::with_builtins();
        let entry = registry
            .parse_auto("totally unstructured text", "application", "api", "session-2")
            .unwrap();
        assert_eq!(entry.kind.level(), Some(signalhub_core::Level::Unknown));
        assert_eq!(entry.raw.as_deref(), Some("totally unstructured text"));
    }

    #[test]
    fn parse_batch_reports_partial_success() {
        let registry = ParserRegistry::with_builtins();
        let lines = vec![
            r#"{"level":"info","message":"ok"}"#.to_string(),
            "unstructured but still parses via generic".to_string(),
        ];
        let outcomes = registry.parse_batch("application", "api", "auto", &lines, "session-3");
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], ParseOutcome::Parsed(_)));
        assert!(matches!(outcomes[1], ParseOutcome::Parsed(_)));
    }
}
