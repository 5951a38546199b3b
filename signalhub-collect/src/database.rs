//! `DatabaseCollector` (spec §4.C): opens a minimal connection per
//! configured instance and queries server-status metrics. Grounded in
//! `real_time_metrics_collector.py`'s `DatabaseMetricsCollector`, which
//! dispatches per-instance on a `kind` string (`redis`/`mongodb`/
//! `postgresql`/`mysql`). The Redis arm here is concrete, using the
//! `redis` crate (the connection-pooled client used by
//! `globalbusinessadvisors-llm-analytics-hub` and
//! `bredmond1019-workflow-engine-rs` in the retrieval pack); Mongo/SQL
//! instances are probed generically via a TCP connect-and-measure-latency
//! check rather than pulling in a driver crate for each (documented in
//! DESIGN.md — no pack example carries a Mongo or SQL driver dependency).

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use redis::aio::ConnectionManager;
use signalhub_core::{Entry, MetricType};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{CollectorError, CollectorResult};

#[derive(Debug, Clone)]
pub enum DatabaseInstanceKind {
    Redis { url: String },
    Generic { kind: String, host: String, port: u16 },
}

#[derive(Debug, Clone)]
pub struct DatabaseInstanceConfig {
    pub name: String,
    pub kind: DatabaseInstanceKind,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseCollectorConfig {
    pub component: String,
    pub instances: Vec<DatabaseInstanceConfig>,
}

enum LiveConnection {
    Redis(Box<ConnectionManager>),
    Generic,
}

pub struct DatabaseCollector {
    config: DatabaseCollectorConfig,
    connections: Vec<Option<LiveConnection>>,
}

impl DatabaseCollector {
    pub fn new(config: DatabaseCollectorConfig) -> DatabaseCollector {
        let n = config.instances.len();
        DatabaseCollector {
            config,
            connections: (0..n).map(|_| None).collect(),
        }
    }

    pub async fn poll(&mut self) -> CollectorResult<Vec<Entry>> {
        let timestamp = Utc::now();
        let component = self.config.component.clone();
        let mut out = Vec::new();

        for i in 0..self.config.instances.len() {
            let instance = self.config.instances[i].clone();
            let mut tags = BTreeMap::new();
            tags.insert("instance".to_string(), instance.name.clone());

            match &instance.kind {
                DatabaseInstanceKind::Redis { url } => {
                    if self.connections[i].is_none() {
                        match redis::Client::open(url.as_str())
                            .ok()
                            .map(|c| c.get_connection_manager())
                        {
                            Some(fut) => match fut.await {
                                Ok(manager) => {
                                    self.connections[i] = Some(LiveConnection::Redis(Box::new(manager)))
                                }
                                Err(e) => {
                                    out.push(failure_entry(timestamp, &component, &instance.name, &e.to_string()));
                                    continue;
                                }
                            },
                            None => {
                                out.push(failure_entry(
                                    timestamp,
                                    &component,
                                    &instance.name,
                                    "invalid redis url",
                                ));
                                continue;
                            }
                        }
                    }

                    if let Some(LiveConnection::Redis(manager)) = &mut self.connections[i] {
                        let started = Instant::now();
                        let pong: redis::RedisResult<String> =
                            redis::cmd("PING").query_async(manager.as_mut()).await;
                        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                        match pong {
                            Ok(_) => {
                                if let Ok(entry) = Entry::new_metric(
                                    timestamp,
                                    "database.redis",
                                    &component,
                                    "query_time_avg_ms",
                                    latency_ms,
                                    Some("ms".to_string()),
                                    tags,
                                ) {
                                    out.push(entry.with_metric_type(MetricType::Timing));
                                }
                            }
                            Err(e) => {
                                self.connections[i] = None;
                                out.push(failure_entry(timestamp, &component, &instance.name, &e.to_string()));
                            }
                        }
                    }
                }
                DatabaseInstanceKind::Generic { kind, host, port } => {
                    let started = Instant::now();
                    let addr = format!("{host}:{port}");
                    let source = format!("database.{kind}");
                    match timeout(Duration::from_secs(3), TcpStream::connect(&addr)).await {
                        Ok(Ok(_)) => {
                            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                            if let Ok(entry) = Entry::new_metric(
                                timestamp,
                                &source,
                                &component,
                                "query_time_avg_ms",
                                latency_ms,
                                Some("ms".to_string()),
                                tags,
                            ) {
                                out.push(entry.with_metric_type(MetricType::Timing));
                            }
                        }
                        _ => {
                            out.push(failure_entry(timestamp, &component, &instance.name, "connect failed or timed out"));
                        }
                    }
                }
            }
        }

        if self.config.instances.is_empty() {
            return Ok(out);
        }
        if out.is_empty() {
            return Err(CollectorError::ProbeFailed(
                "no configured database instance responded".to_string(),
            ));
        }
        Ok(out)
    }
}

fn failure_entry(
    timestamp: chrono::DateTime<Utc>,
    component: &str,
    instance: &str,
    reason: &str,
) -> Entry {
    let mut tags = BTreeMap::new();
    tags.insert("instance".to_string(), instance.to_string());
    Entry::new_log(
        timestamp,
        "database",
        component,
        signalhub_core::Level::Error,
        format!("probe of {instance} failed: {reason}"),
        tags,
        None,
        None,
    )
    .expect("component/source are non-empty constants")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn poll_is_empty_with_no_instances() {
        let mut collector = DatabaseCollector::new(DatabaseCollectorConfig::default());
        let batch = collector.poll().await.unwrap();
        assert!(batch.is_empty());
    }
}
