//! `ContainerCollector` (spec §4.C): reads per-container CPU/mem/IO via the
//! local container runtime. The original (`DockerMetricsCollector` in
//! `real_time_metrics_collector.py`) shells out to the `docker` Python SDK;
//! no pack example depends on a Docker Engine API client crate
//! (`bollard`), so this reads the same cgroup v2 accounting files the
//! Docker/containerd runtimes themselves populate under
//! `/sys/fs/cgroup/<container_id>/`, avoiding a daemon socket dependency
//! the workspace does not otherwise need (documented in DESIGN.md).

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use signalhub_core::{Entry, MetricType};
use tokio::fs;

use crate::error::{CollectorError, CollectorResult};

#[derive(Debug, Clone)]
pub struct ContainerCollectorConfig {
    pub component: String,
    pub cgroup_root: PathBuf,
    pub container_ids: Vec<String>,
}

impl Default for ContainerCollectorConfig {
    fn default() -> Self {
        ContainerCollectorConfig {
            component: "docker".to_string(),
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
            container_ids: Vec::new(),
        }
    }
}

pub struct ContainerCollector {
    config: ContainerCollectorConfig,
}

impl ContainerCollector {
    pub fn new(config: ContainerCollectorConfig) -> ContainerCollector {
        ContainerCollector { config }
    }

    pub async fn poll(&mut self) -> CollectorResult<Vec<Entry>> {
        let timestamp = Utc::now();
        let mut out = Vec::new();

        for container_id in &self.config.container_ids {
            let base = self.config.cgroup_root.join(container_id);
            let mut tags = BTreeMap::new();
            tags.insert("container_id".to_string(), container_id.clone());

            if let Some(cpu_usec) = read_u64_field(&base.join("cpu.stat"), "usage_usec").await {
                if let Ok(entry) = Entry::new_metric(
                    timestamp,
                    "docker",
                    &self.config.component,
                    "container_cpu_usage_usec",
                    cpu_usec as f64,
                    Some("microseconds".to_string()),
                    tags.clone(),
                ) {
                    out.push(entry.with_metric_type(MetricType::Counter));
                }
            }

            if let Some(mem_bytes) = read_u64(&base.join("memory.current")).await {
                if let Ok(entry) = Entry::new_metric(
                    timestamp,
                    "docker",
                    &self.config.component,
                    "container_memory_bytes",
                    mem_bytes as f64,
                    Some("bytes".to_string()),
                    tags.clone(),
                ) {
                    out.push(entry.with_metric_type(MetricType::Gauge));
                }
            }

            if let Some(io_bytes) = read_io_bytes(&base.join("io.stat")).await {
                if let Ok(entry) = Entry::new_metric(
                    timestamp,
                    "docker",
                    &self.config.component,
                    "container_io_bytes",
                    io_bytes as f64,
                    Some("bytes".to_string()),
                    tags,
                ) {
                    out.push(entry.with_metric_type(MetricType::Counter));
                }
            }
        }

        if self.config.container_ids.is_empty() {
            return Ok(out);
        }
        if out.is_empty() {
            return Err(CollectorError::ProbeFailed(
                "no cgroup accounting files were readable for any configured container".to_string(),
            ));
        }
        Ok(out)
    }
}

async fn read_u64(path: &std::path::Path) -> Option<u64> {
    fs::read_to_string(path).await.ok()?.trim().parse().ok()
}

async fn read_u64_field(path: &std::path::Path, field: &str) -> Option<u64> {
    let contents = fs::read_to_string(path).await.ok()?;
    for line in contents.lines() {
        if let Some(value) = line.strip_prefix(&format!("{field} ")) {
            return value.trim().parse().ok();
        }
    }
    None
}

async fn read_io_bytes(path: &std::path::Path) -> Option<u64> {
    let contents = fs::read_to_string(path).await.ok()?;
    let mut total = 0u64;
    let mut found = false;
    for line in contents.lines() {
        for field in ["rbytes", "wbytes"] {
            if let Some(pos) = line.find(&format!("{field}=")) {
                let rest = &line[pos + field.len() + 1..];
                let value_str: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                if let Ok(value) = value_str.parse::<u64>() {
                    total += value;
                    found = true;
                }
            }
        }
    }
    found.then_some(total)
}
