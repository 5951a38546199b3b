//! Process signal handling: `SIGINT`/`SIGTERM` trigger the graceful shutdown
//! sequence, `SIGHUP` reloads the dependency map. Grounded in
//! `dashflow-observability`'s `bin/websocket_server::shutdown_signal`
//! (`ctrl_c` plus `SignalKind::terminate()` raced in one `select!`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use signalhub_analyzer::DependencyMap;
use signalhub_store::EntryStore;
use tokio::sync::watch;

/// Resolves once `SIGINT` or `SIGTERM` (or, off Unix, just Ctrl+C) arrives.
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install sigterm handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Spawns a task that reloads the dependency map from `path` on every
/// `SIGHUP` and publishes it on `cascade_tx` (spec §6.7: "reloaded ... on
/// `SIGHUP`. Absence is not an error" — a reload that fails to parse is
/// logged and the previous map is kept). Off Unix this task never fires.
#[cfg(unix)]
pub fn spawn_dependency_map_reloader(path: PathBuf, cascade_tx: watch::Sender<DependencyMap>) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to install sighup handler");
                return;
            }
        };
        loop {
            hangup.recv().await;
            match DependencyMap::load(&path) {
                Ok(map) => {
                    tracing::info!(path = %path.display(), "reloaded dependency map");
                    if cascade_tx.send(map).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, path = %path.display(), "failed to reload dependency map, keeping previous"),
            }
        }
    });
}

#[cfg(not(unix))]
pub fn spawn_dependency_map_reloader(_path: PathBuf, _cascade_tx: watch::Sender<DependencyMap>) {}

/// Spawns the background retention loop (spec §3.6): every `interval`, prune
/// entries and alerts older than `retention_days`. The Store is free to run
/// this at its own pace (§4.B); a `tokio::time::interval` tick grounded in
/// the same periodic-task shape `dashflow-observability`'s metrics exporter
/// uses for its own scrape loop. Returns a handle the shutdown sequence can
/// abort once the Store has flushed, since a prune racing the final flush
/// only deletes rows a query would no longer be allowed to return anyway.
pub fn spawn_retention_loop(store: Arc<dyn EntryStore>, retention_days: u32, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days as i64);
            match store.prune(cutoff).await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, retention_days, "pruned entries/alerts past retention window")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "retention prune failed"),
            }
        }
    })
}
