//! Environment variable names and a typed, layered config loader: defaults,
//! then an optional config file, then environment variables, then explicit
//! CLI flags — each layer overriding the last. Named-const-plus-accessor
//! shape grounded in `dashflow-streaming::env_vars`.

use std::path::PathBuf;

use serde::Deserialize;

/// Store file path.
pub const RLS_DB_PATH: &str = "RLS_DB_PATH";
/// `host:port` the server binds to.
pub const RLS_LISTEN: &str = "RLS_LISTEN";
/// Entry/alert retention window, in days.
pub const RLS_RETENTION_DAYS: &str = "RLS_RETENTION_DAYS";
/// Ingestion Bus bounded-channel capacity.
pub const RLS_BUS_CAPACITY: &str = "RLS_BUS_CAPACITY";
/// Enricher shard count.
pub const RLS_ENRICHER_WORKERS: &str = "RLS_ENRICHER_WORKERS";
/// Per-subscriber Fanout Hub queue capacity.
pub const RLS_FANOUT_QUEUE: &str = "RLS_FANOUT_QUEUE";

fn env_usize_or_default(name: &str, default: usize) -> usize {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32_or_default(name: &str, default: u32) -> u32 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Resolved settings for one run, after merging defaults, config file,
/// environment variables, and CLI overrides (in that precedence order).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listen: String,
    pub db_path: PathBuf,
    pub retention_days: u32,
    pub bus_capacity: usize,
    pub enricher_workers: usize,
    pub fanout_queue: usize,
    pub dependency_map_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            listen: "127.0.0.1:8765".to_string(),
            db_path: PathBuf::from("signalhub.db"),
            retention_days: 30,
            bus_capacity: 10_000,
            enricher_workers: 4,
            fanout_queue: 256,
            dependency_map_path: None,
        }
    }
}

impl Settings {
    /// Loads defaults, then an optional TOML/YAML/JSON config file (via the
    /// `config` crate), then the `RLS_*` environment variables, mirroring
    /// the teacher's config-file-then-env-override layering.
    pub fn load(config_file: Option<&PathBuf>) -> anyhow::Result<Settings> {
        let mut builder = config::Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }
        let layered = builder.build()?;
        let mut settings: Settings = layered.try_deserialize()?;

        if let Ok(listen) = std::env::var(RLS_LISTEN) {
            settings.listen = listen;
        }
        if let Ok(db_path) = std::env::var(RLS_DB_PATH) {
            settings.db_path = PathBuf::from(db_path);
        }
        settings.retention_days = env_u32_or_default(RLS_RETENTION_DAYS, settings.retention_days);
        settings.bus_capacity = env_usize_or_default(RLS_BUS_CAPACITY, settings.bus_capacity);
        settings.enricher_workers = env_usize_or_default(RLS_ENRICHER_WORKERS, settings.enricher_workers);
        settings.fanout_queue = env_usize_or_default(RLS_FANOUT_QUEUE, settings.fanout_queue);

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_overrides_them() {
        let settings = Settings::default();
        assert_eq!(settings.listen, "127.0.0.1:8765");
        assert_eq!(settings.retention_days, 30);
    }
}
