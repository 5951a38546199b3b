use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

/// Ordered log severity, `Trace` < `Debug` < `Info` < `Warn` < `Error` < `Fatal`.
///
/// `Unknown` is produced when a producer or parser could not determine a
/// level; it never participates in the ordered comparisons used by
/// threshold/filter checks (see [`Level::floor_matches`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Unknown,
}

impl<'de> Deserialize<'de> for Level {
    /// Deserializes through [`Level::normalize`] rather than a strict
    /// case/synonym match, so every boundary that accepts a `Level` over the
    /// wire (the submit RPC included, not just the text-line parsers) treats
    /// `"ERROR"`/`"warning"`/etc the same way (spec §4.F).
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Level::normalize(&raw))
    }
}

impl Level {
    fn rank(self) -> Option<u8> {
        match self {
            Level::Trace => Some(0),
            Level::Debug => Some(1),
            Level::Info => Some(2),
            Level::Warn => Some(3),
            Level::Error => Some(4),
            Level::Fatal => Some(5),
            Level::Unknown => None,
        }
    }

    /// Canonicalizes case/synonym variants the way the Enricher does
    /// (`warning` -> `warn`, `err` -> `error`, etc).
    pub fn normalize(raw: &str) -> Level {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trace" | "verbose" => Level::Trace,
            "debug" | "dbg" => Level::Debug,
            "info" | "information" | "notice" => Level::Info,
            "warn" | "warning" => Level::Warn,
            "error" | "err" | "severe" => Level::Error,
            "fatal" | "critical" | "crit" | "panic" => Level::Fatal,
            _ => Level::Unknown,
        }
    }

    /// True if `self` is at or above `floor`. `Unknown` never satisfies a
    /// floor other than `Unknown` itself, and `Unknown` as a floor matches
    /// everything (an absent filter).
    pub fn floor_matches(self, floor: Level) -> bool {
        match (self.rank(), floor.rank()) {
            (Some(a), Some(b)) => a >= b,
            (None, None) => true,
            (None, Some(_)) => false,
            (Some(_), None) => true,
        }
    }
}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
            Level::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl FromStr for Level {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Level::normalize(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_known_levels() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn unknown_is_incomparable() {
        assert_eq!(Level::Unknown.partial_cmp(&Level::Info), None);
    }

    #[test]
    fn normalizes_synonyms() {
        assert_eq!(Level::normalize("WARNING"), Level::Warn);
        assert_eq!(Level::normalize("err"), Level::Error);
        assert_eq!(Level::normalize("crit"), Level::Fatal);
        assert_eq!(Level::normalize("nonsense"), Level::Unknown);
    }

    #[test]
    fn deserializes_non_canonical_strings_via_normalize() {
        let level: Level = serde_json::from_str(r#""ERROR""#).unwrap();
        assert_eq!(level, Level::Error);
        let level: Level = serde_json::from_str(r#""Warning""#).unwrap();
        assert_eq!(level, Level::Warn);
        let level: Level = serde_json::from_str(r#""nonsense""#).unwrap();
        assert_eq!(level, Level::Unknown);
    }

    #[test]
    fn floor_matches_respects_unknown_semantics() {
        assert!(Level::Error.floor_matches(Level::Warn));
        assert!(!Level::Info.floor_matches(Level::Warn));
        assert!(!Level::Unknown.floor_matches(Level::Warn));
        assert!(Level::Info.floor_matches(Level::Unknown));
        assert!(Level::Unknown.floor_matches(Level::Unknown));
    }
}
