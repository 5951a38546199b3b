//! `ApplicationCollector` (spec §4.C): probes HTTP endpoints, records
//! response time, status code, and a moving error rate. Grounded in
//! `real_time_metrics_collector.py`'s `ApplicationMetricsCollector`
//! (`requests.get(endpoint, timeout=5)`, a rolling `deque` of response
//! times, a per-endpoint error counter), ported onto `reqwest` — already in
//! the teacher's own dependency table (`dashflow`'s root `Cargo.toml`).

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use chrono::Utc;
use signalhub_core::{Entry, Level, MetricType};

use crate::error::{CollectorError, CollectorResult};

#[derive(Debug, Clone)]
pub struct ApplicationCollectorConfig {
    pub component: String,
    pub endpoints: Vec<String>,
    pub timeout: Duration,
    /// Window size for the moving response-time average (spec: mirrors the
    /// original's `deque(maxlen=100)`).
    pub response_time_window: usize,
}

impl Default for ApplicationCollectorConfig {
    fn default() -> Self {
        ApplicationCollectorConfig {
            component: "application".to_string(),
            endpoints: Vec::new(),
            timeout: Duration::from_secs(5),
            response_time_window: 100,
        }
    }
}

pub struct ApplicationCollector {
    config: ApplicationCollectorConfig,
    client: reqwest::Client,
    response_times: VecDeque<f64>,
    error_counts: BTreeMap<String, u64>,
    probes_total: u64,
}

impl ApplicationCollector {
    pub fn new(config: ApplicationCollectorConfig) -> CollectorResult<ApplicationCollector> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollectorError::ProbeFailed(e.to_string()))?;
        Ok(ApplicationCollector {
            config,
            client,
            response_times: VecDeque::new(),
            error_counts: BTreeMap::new(),
            probes_total: 0,
        })
    }

    pub async fn poll(&mut self) -> CollectorResult<Vec<Entry>> {
        let timestamp = Utc::now();
        let component = self.config.component.clone();
        let mut out = Vec::new();

        for endpoint in self.config.endpoints.clone() {
            self.probes_total += 1;
            let started = tokio::time::Instant::now();
            let mut tags = BTreeMap::new();
            tags.insert("endpoint".to_string(), endpoint.clone());

            match self.client.get(&endpoint).send().await {
                Ok(response) => {
                    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                    self.push_response_time(elapsed_ms);
                    let status = response.status().as_u16();
                    if let Ok(entry) = Entry::new_metric(
                        timestamp,
                        "application",
                        &component,
                        "http_response_time_ms",
                        elapsed_ms,
                        Some("ms".to_string()),
                        tags.clone(),
                    ) {
                        out.push(entry.with_metric_type(MetricType::Timing));
                    }
                    if status >= 400 {
                        *self.error_counts.entry(endpoint.clone()).or_default() += 1;
                        if let Ok(entry) = Entry::new_log(
                            timestamp,
                            "application",
                            &component,
                            Level::Warn,
                            format!("endpoint {endpoint} returned status {status}"),
                            tags,
                            None,
                            None,
                        ) {
                            out.push(entry);
                        }
                    }
                }
                Err(e) => {
                    *self.error_counts.entry(endpoint.clone()).or_default() += 1;
                    if let Ok(entry) = Entry::new_log(
                        timestamp,
                        "application",
                        &component,
                        Level::Error,
                        format!("probe of {endpoint} failed: {e}"),
                        tags,
                        None,
                        None,
                    ) {
                        out.push(entry);
                    }
                }
            }
        }

        if let Some(avg) = self.average_response_time() {
            if let Ok(entry) = Entry::new_metric(
                timestamp,
                "application",
                &component,
                "http_response_time_avg_ms",
                avg,
                Some("ms".to_string()),
                BTreeMap::new(),
            ) {
                out.push(entry.with_metric_type(MetricType::Timing));
            }
        }

        let total_errors: u64 = self.error_counts.values().sum();
        let error_rate = if self.probes_total > 0 {
            total_errors as f64 / self.probes_total as f64 * 100.0
        } else {
            0.0
        };
        if let Ok(entry) = Entry::new_metric(
            timestamp,
            "application",
            &component,
            "error_rate_percent",
            error_rate,
            Some("percent".to_string()),
            BTreeMap::new(),
        ) {
            out.push(entry.with_metric_type(MetricType::Gauge));
        }

        Ok(out)
    }

    fn push_response_time(&mut self, ms: f64) {
        if self.response_times.len() >= self.config.response_time_window {
            self.response_times.pop_front();
        }
        self.response_times.push_back(ms);
    }

    fn average_response_time(&self) -> Option<f64> {
        if self.response_times.is_empty() {
            return None;
        }
        Some(self.response_times.iter().sum::<f64>() / self.response_times.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_average_window_is_bounded() {
        let mut collector = ApplicationCollector::new(ApplicationCollectorConfig {
            response_time_window: 3,
            ..Default::default()
        })
        .unwrap();
        for v in [10.0, 20.0, 30.0, 40.0] {
            collector.push_response_time(v);
        }
        assert_eq!(collector.response_times.len(), 3);
        assert_eq!(collector.average_response_time(), Some(30.0));
    }
}
