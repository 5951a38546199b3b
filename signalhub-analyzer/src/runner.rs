//! Runs the [`Analyzer`] as a spawned task: a pure consumer of enriched
//! Entries, producer of Entries (passed through unchanged) and Alerts (spec
//! §9, "break cycles by making the Analyzer a pure consumer/producer; the
//! Fanout Hub reads from a queue the Analyzer writes to"). Shaped after
//! `signalhub_ingest::Enricher::spawn` — a single task pulling from an
//! inbound channel and forwarding to one or more outbound channels, with a
//! clean shutdown that drains the channel before returning.

use std::collections::HashMap;

use signalhub_core::{AlertEvent, Entry};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{AnalyzerConfig, SeriesBaseline};
use crate::engine::Analyzer;
use crate::cascade::DependencyMap;
use crate::metrics::{ALERTS_EMITTED_TOTAL, ENTRIES_ANALYZED_TOTAL};

/// Owns the spawned analyzer task. `entries` receives every Entry exactly
/// once, unchanged, for the Store/Fanout stages downstream. `alerts`
/// receives every Alert the Analyzer emits.
pub struct AnalyzerHandle {
    handle: Option<JoinHandle<()>>,
}

impl AnalyzerHandle {
    /// Spawns the analyzer loop. `input` is the enriched-Entry stream (the
    /// Enricher's `output`); `entries_out` re-broadcasts each Entry
    /// downstream; `alerts_out` carries produced Alerts. `cascade_reload`,
    /// when present, is watched for a freshly loaded dependency map (spec
    /// §6.7: reloaded on `SIGHUP`) and swapped in without restarting the
    /// task.
    pub fn spawn(
        mut input: mpsc::Receiver<Entry>,
        entries_out: mpsc::Sender<Entry>,
        alerts_out: mpsc::Sender<AlertEvent>,
        config: AnalyzerConfig,
        baselines: HashMap<(String, String), SeriesBaseline>,
        cascade: DependencyMap,
        mut cascade_reload: Option<watch::Receiver<DependencyMap>>,
    ) -> AnalyzerHandle {
        let handle = tokio::spawn(async move {
            let mut analyzer = Analyzer::new(config, baselines).with_cascade_map(cascade);
            loop {
                let entry = match &mut cascade_reload {
                    Some(reload) => {
                        tokio::select! {
                            entry = input.recv() => entry,
                            changed = reload.changed() => {
                                if changed.is_ok() {
                                    analyzer.set_cascade_map(reload.borrow_and_update().clone());
                                }
                                continue;
                            }
                        }
                    }
                    None => input.recv().await,
                };
                let Some(entry) = entry else { break };

                let queue_depth = input.len();
                let events = analyzer.process_entry(&entry, queue_depth);
                ENTRIES_ANALYZED_TOTAL.inc();

                for event in events {
                    match &event {
                        AlertEvent::New(alert) => {
                            ALERTS_EMITTED_TOTAL.with_label_values(&[level_label(alert.level)]).inc();
                            debug!(metric_or_event = %alert.metric_or_event, level = ?alert.level, "alert emitted");
                        }
                        AlertEvent::Updated(update) => {
                            debug!(alert_id = %update.id, "alert observation updated under cool-down");
                        }
                    }
                    if alerts_out.send(event).await.is_err() {
                        break;
                    }
                }

                if entries_out.send(entry).await.is_err() {
                    break;
                }
            }
        });

        AnalyzerHandle { handle: Some(handle) }
    }

    /// Waits for the analyzer task to finish draining its inbound channel
    /// (graceful shutdown step 5, spec §5: "Analyzer finishes processing
    /// in-flight entries").
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

fn level_label(level: signalhub_core::AlertLevel) -> &'static str {
    match level {
        signalhub_core::AlertLevel::Info => "info",
        signalhub_core::AlertLevel::Warning => "warning",
        signalhub_core::AlertLevel::Critical => "critical",
        signalhub_core::AlertLevel::Emergency => "emergency",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn passes_entries_through_and_emits_alerts_for_error_logs() {
        let (entry_tx, entry_rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let (alert_tx, mut alert_rx) = mpsc::channel(16);

        let handle = AnalyzerHandle::spawn(
            entry_rx,
            out_tx,
            alert_tx,
            AnalyzerConfig::default(),
            HashMap::new(),
            DependencyMap::empty(),
            None,
        );

        let entry = Entry::new_log(
            Utc::now(),
            "application",
            "api",
            signalhub_core::Level::Error,
            "boom",
            BTreeMap::new(),
            None,
            None,
        )
        .unwrap();
        entry_tx.send(entry.clone()).await.unwrap();
        drop(entry_tx);

        let passed_through = out_rx.recv().await.unwrap();
        assert_eq!(passed_through.id, entry.id);

        let event = alert_rx.recv().await.unwrap();
        match event {
            AlertEvent::New(alert) => assert_eq!(alert.level, signalhub_core::AlertLevel::Critical),
            AlertEvent::Updated(_) => panic!("expected a new alert, not an update"),
        }

        handle.shutdown().await;
    }
}
