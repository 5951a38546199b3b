use serde::{Deserialize, Serialize};

/// The Collector state machine (spec §4.C): `Stopped -> Active ->
/// (Error | Paused) -> Active -> Stopped`. `Error` is entered after
/// `error_threshold` consecutive poll failures and exits only via an
/// explicit `reset` or `stop` — never on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorState {
    Stopped,
    Active,
    Paused,
    Error,
}

impl CollectorState {
    pub fn can_poll(self) -> bool {
        matches!(self, CollectorState::Active)
    }
}

impl std::fmt::Display for CollectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CollectorState::Stopped => "stopped",
            CollectorState::Active => "active",
            CollectorState::Paused => "paused",
            CollectorState::Error => "error",
        };
        f.write_str(s)
    }
}
