//! Process bootstrap for the signalhub daemon: parses CLI flags, layers in
//! config-file and environment overrides, wires the Store, Ingestion Bus,
//! Enricher, Analyzer, Fanout Hub, Collector Pool, and Server together, and
//! drives the graceful shutdown sequence. Grounded in the teacher's
//! `dashflow-cli`/`dashflow-observability` binaries: `clap::Parser` for
//! flags, `tracing-subscriber` env-filter logging, and a `ctrl_c`/`SIGTERM`
//! `select!` for shutdown.

mod settings;
mod shutdown;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use signalhub_analyzer::{AnalyzerConfig, AnalyzerHandle, DependencyMap};
use signalhub_collect::{Collector, CollectorKind, CollectorPool, SystemCollector, SystemCollectorConfig};
use signalhub_fanout::FanoutHub;
use signalhub_ingest::{BusConfig, Enricher, EnricherConfig, IngestionBus};
use signalhub_parsers::ParserRegistry;
use signalhub_store::{EntryStore, SqliteStore};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

/// Real-time log/metrics ingestion, analysis, and streaming daemon.
#[derive(Parser, Debug)]
#[command(name = "signalhub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ingests logs and metrics, analyzes them in real time, and streams alerts")]
struct Cli {
    /// Address to bind the JSON-RPC/WebSocket/metrics server to, e.g. 0.0.0.0:8765.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (combined with --host's address part, or with 127.0.0.1).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the SQLite store file.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Path to an optional config file (TOML/YAML/JSON, loaded via the `config` crate).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a dependency-map JSON file for cascade annotation (spec §6.7). Reloaded on SIGHUP.
    #[arg(long)]
    dependency_map: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,

    /// Enable verbose (trace-level) logging.
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(cli: &Cli) {
    let default_directive = if cli.verbose {
        "trace"
    } else if cli.debug {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, "fatal startup or runtime error");
            Err(e)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load(cli.config.as_ref()).context("loading configuration")?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    if let Some(host) = cli.host {
        let port = settings
            .listen
            .rsplit_once(':')
            .and_then(|(_, p)| p.parse::<u16>().ok())
            .unwrap_or(8765);
        settings.listen = format!("{host}:{}", cli.port.unwrap_or(port));
    } else if let Some(port) = cli.port {
        let host = settings.listen.rsplit_once(':').map(|(h, _)| h.to_string()).unwrap_or_default();
        settings.listen = format!("{host}:{port}");
    }
    if let Some(path) = cli.dependency_map {
        settings.dependency_map_path = Some(path);
    }

    tracing::info!(listen = %settings.listen, db = %settings.db_path.display(), "starting signalhub");

    let store: Arc<dyn EntryStore> = Arc::new(
        SqliteStore::open(&settings.db_path)
            .await
            .with_context(|| format!("opening store at {}", settings.db_path.display()))?,
    );

    let bus = IngestionBus::new(BusConfig {
        capacity: settings.bus_capacity,
        ..Default::default()
    });

    let cascade = match &settings.dependency_map_path {
        Some(path) => DependencyMap::load(path).with_context(|| format!("loading dependency map {}", path.display()))?,
        None => DependencyMap::empty(),
    };
    let (cascade_tx, cascade_rx) = tokio::sync::watch::channel(cascade.clone());

    let (enriched_tx, enriched_rx) = tokio::sync::mpsc::channel(settings.bus_capacity.min(10_000));
    let enricher = Enricher::spawn(
        bus.clone(),
        EnricherConfig {
            shard_count: settings.enricher_workers.max(1),
            ..Default::default()
        },
        enriched_tx,
    );

    let (entries_tx, mut entries_rx) = tokio::sync::mpsc::channel(settings.bus_capacity.min(10_000));
    let (alerts_tx, mut alerts_rx) = tokio::sync::mpsc::channel(settings.bus_capacity.min(10_000));
    let analyzer = AnalyzerHandle::spawn(
        enriched_rx,
        entries_tx,
        alerts_tx,
        AnalyzerConfig::default(),
        HashMap::new(),
        cascade,
        Some(cascade_rx),
    );

    let fanout = Arc::new(FanoutHub::new());

    let sink_store = store.clone();
    let sink_fanout = fanout.clone();
    let entry_sink = tokio::spawn(async move {
        while let Some(entry) = entries_rx.recv().await {
            sink_fanout.publish_entry(&entry);
            if let Err(e) = sink_store.append(vec![entry]).await {
                tracing::warn!(error = %e, "failed to persist entry");
            }
        }
    });

    let alert_store = store.clone();
    let alert_fanout = fanout.clone();
    let alert_sink = tokio::spawn(async move {
        while let Some(event) = alerts_rx.recv().await {
            match event {
                signalhub_core::AlertEvent::New(alert) => {
                    alert_fanout.publish_alert(&alert);
                    if let Err(e) = alert_store.append_alerts(vec![alert]).await {
                        tracing::warn!(error = %e, "failed to persist alert");
                    }
                }
                signalhub_core::AlertEvent::Updated(update) => {
                    match alert_store.update_alert_observation(update).await {
                        Ok(true) => {}
                        Ok(false) => tracing::debug!("cool-down update referenced an alert no longer in the store"),
                        Err(e) => tracing::warn!(error = %e, "failed to apply alert observation update"),
                    }
                }
            }
        }
    });

    let pool = Arc::new(CollectorPool::new(bus.clone()));
    pool.register(
        Collector::new("system", CollectorKind::System(SystemCollector::new(SystemCollectorConfig::default()))),
        Duration::from_secs(15),
    );
    pool.start("system").await;

    let parsers = Arc::new(ParserRegistry::with_builtins());
    let state = signalhub_server::AppState::new(store.clone(), bus.clone(), fanout.clone(), parsers)
        .with_collectors(pool.clone());

    if let Some(path) = settings.dependency_map_path.clone() {
        shutdown::spawn_dependency_map_reloader(path, cascade_tx);
    }

    let retention_task = shutdown::spawn_retention_loop(store.clone(), settings.retention_days, Duration::from_secs(3600));

    let router = signalhub_server::router(state.clone());
    let listener = TcpListener::bind(settings.listen.as_str())
        .await
        .with_context(|| format!("binding {}", settings.listen))?;

    let serve_state = state.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown::wait_for_shutdown_signal().await;
            tracing::info!("shutdown signal received, draining");
            serve_state.begin_draining();
        })
        .await
        .context("server loop")?;

    pool.stop("system").await;
    bus.close();
    enricher.shutdown().await;
    analyzer.shutdown().await;
    let _ = entry_sink.await;
    let _ = alert_sink.await;
    retention_task.abort();
    fanout.close_all().await;

    tracing::info!("shutdown complete");
    Ok(())
}
