//! The Enricher (spec §4.F): the Ingestion Bus's sole consumer. Logically
//! single-threaded, parallelized here by sharding on `source` — each shard
//! is an independent worker task with its own inbound channel, grounded in
//! the per-tenant sharding `dashflow-streaming::rate_limiter` uses to keep
//! unrelated keys from contending on the same lock.

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use signalhub_core::{Entry, EntryKind, Level};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::bus::IngestionBus;

/// Default maximum `message` size before truncation (64KB, spec §4.F).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

const TRUNCATION_MARKER: &str = "[truncated]";

#[derive(Debug, Clone)]
pub struct EnricherConfig {
    /// Process-wide tags applied when absent on the Entry (host, env,
    /// version, ...).
    pub process_tags: BTreeMap<String, String>,
    /// Tag key inspected to derive `correlation_id` when one is not already
    /// set (e.g. `"trace_id"`).
    pub correlation_tag_key: Option<String>,
    pub max_message_bytes: usize,
    pub shard_count: usize,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        EnricherConfig {
            process_tags: BTreeMap::new(),
            correlation_tag_key: Some("trace_id".to_string()),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            shard_count: 4,
        }
    }
}

/// Applies the Enricher's rules to a single Entry in place: process-wide
/// tags, level normalization, correlation id derivation, and message
/// truncation. Performs no semantic inspection beyond this — the Analyzer
/// owns everything past this point (spec §4.F).
pub fn enrich(entry: &mut Entry, config: &EnricherConfig) {
    for (key, value) in &config.process_tags {
        entry.tags.entry(key.clone()).or_insert_with(|| value.clone());
    }

    if entry.correlation_id.is_none() {
        if let Some(key) = &config.correlation_tag_key {
            if let Some(value) = entry.tags.get(key) {
                entry.correlation_id = Some(value.clone());
            }
        }
    }

    // `Level`'s `Deserialize` impl already runs every incoming level string
    // through `Level::normalize` (signalhub-core/src/level.rs), so a `Level`
    // reaching the Enricher is canonical regardless of which boundary it
    // came in through (structured submit, submit_raw, or a Parser Registry
    // parser constructing one directly).
    if let EntryKind::Log { message, .. } = &mut entry.kind {
        truncate_message(message, config.max_message_bytes);
    }
}

fn truncate_message(message: &mut String, max_bytes: usize) {
    if message.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes.min(message.len());
    while cut > 0 && !message.is_char_boundary(cut) {
        cut -= 1;
    }
    message.truncate(cut);
    message.push_str(TRUNCATION_MARKER);
}

fn shard_for(source: &str, shard_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    (hasher.finish() as usize) % shard_count.max(1)
}

/// Owns the sharded worker pool that drains the Ingestion Bus, enriches
/// each Entry, and forwards it downstream (to the Analyzer, Store, and
/// Fanout Hub via `output`).
pub struct Enricher {
    shards: Vec<mpsc::Sender<Entry>>,
    config: Arc<EnricherConfig>,
    workers: Vec<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Enricher {
    /// Spawns `config.shard_count` worker tasks plus one dispatcher task
    /// that pulls from `bus` and routes each Entry to its shard by hashed
    /// `source`. `output` receives every enriched Entry exactly once.
    pub fn spawn(bus: IngestionBus, config: EnricherConfig, output: mpsc::Sender<Entry>) -> Enricher {
        let config = Arc::new(config);
        let mut shards = Vec::with_capacity(config.shard_count);
        let mut workers = Vec::with_capacity(config.shard_count);

        for shard_id in 0..config.shard_count {
            let (tx, mut rx) = mpsc::channel::<Entry>(256);
            let worker_config = config.clone();
            let worker_output = output.clone();
            let handle = tokio::spawn(async move {
                while let Some(mut entry) = rx.recv().await {
                    enrich(&mut entry, &worker_config);
                    debug!(shard = shard_id, source = %entry.source, "enriched entry");
                    if worker_output.send(entry).await.is_err() {
                        break;
                    }
                }
            });
            shards.push(tx);
            workers.push(handle);
        }

        let dispatch_shards = shards.clone();
        let dispatch_shard_count = config.shard_count;
        let dispatcher = tokio::spawn(async move {
            while let Some(entry) = bus.recv().await {
                let shard = shard_for(&entry.source, dispatch_shard_count);
                if dispatch_shards[shard].send(entry).await.is_err() {
                    break;
                }
            }
        });

        Enricher {
            shards,
            config,
            workers,
            dispatcher: Some(dispatcher),
        }
    }

    pub fn config(&self) -> &EnricherConfig {
        &self.config
    }

    /// Stops accepting new work and waits for in-flight entries to finish
    /// (graceful shutdown step 4, spec §5).
    pub async fn shutdown(mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.await;
        }
        drop(self.shards);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
