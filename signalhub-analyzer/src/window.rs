//! The per-series sliding window (spec §3.3): a bounded ring of recent
//! samples plus Welford-updated running statistics. Governed by whichever
//! of the size bound or time bound is smaller. Eviction never rescans the
//! retained samples: running mean/variance reverse through
//! [`WelfordStats::remove`] and min/max ride on monotonic deques (the
//! classic sliding-window-minimum technique), so `push` stays O(1)
//! amortized regardless of `max_samples`.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::stats::WelfordStats;

#[derive(Debug, Clone)]
struct Sample {
    at: DateTime<Utc>,
    value: f64,
    seq: u64,
}

pub struct SlidingWindow {
    samples: VecDeque<Sample>,
    max_samples: usize,
    max_age: Duration,
    stats: WelfordStats,
    next_seq: u64,
    // Monotonic deques of (seq, value): `max_deque` non-increasing from the
    // front, `min_deque` non-decreasing from the front. The front always
    // holds the current max/min among retained samples.
    max_deque: VecDeque<(u64, f64)>,
    min_deque: VecDeque<(u64, f64)>,
}

impl SlidingWindow {
    pub fn new(max_samples: usize, max_age: Duration) -> SlidingWindow {
        SlidingWindow {
            samples: VecDeque::with_capacity(max_samples.min(1024)),
            max_samples,
            max_age,
            stats: WelfordStats::new(),
            next_seq: 0,
            max_deque: VecDeque::new(),
            min_deque: VecDeque::new(),
        }
    }

    pub fn push(&mut self, at: DateTime<Utc>, value: f64) {
        let seq = self.next_seq;
        self.next_seq += 1;

        while self.max_deque.back().is_some_and(|&(_, v)| v <= value) {
            self.max_deque.pop_back();
        }
        self.max_deque.push_back((seq, value));
        while self.min_deque.back().is_some_and(|&(_, v)| v >= value) {
            self.min_deque.pop_back();
        }
        self.min_deque.push_back((seq, value));

        self.samples.push_back(Sample { at, value, seq });
        self.stats.update(value);

        self.evict_stale(at);
        while self.samples.len() > self.max_samples {
            self.evict_front();
        }
    }

    fn evict_stale(&mut self, now: DateTime<Utc>) {
        let max_age = chrono::Duration::from_std(self.max_age).unwrap_or(chrono::Duration::days(3650));
        loop {
            let should_evict = match self.samples.front() {
                Some(front) => now - front.at > max_age,
                None => false,
            };
            if !should_evict {
                break;
            }
            self.evict_front();
        }
    }

    /// Removes the oldest retained sample, reversing its contribution to
    /// `stats` and popping it from the monotonic deques if it's still their
    /// current extremum.
    fn evict_front(&mut self) {
        let Some(sample) = self.samples.pop_front() else { return };
        self.stats.remove(sample.value);
        if self.max_deque.front().is_some_and(|&(seq, _)| seq == sample.seq) {
            self.max_deque.pop_front();
        }
        if self.min_deque.front().is_some_and(|&(seq, _)| seq == sample.seq) {
            self.min_deque.pop_front();
        }
    }

    pub fn stats(&self) -> &WelfordStats {
        &self.stats
    }

    pub fn min(&self) -> f64 {
        self.min_deque.front().map(|&(_, v)| v).unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.max_deque.front().map(|&(_, v)| v).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Approximate p95 (spec §3.3 "any algorithm giving bounded error is
    /// acceptable"): sorts the retained window, which is bounded by
    /// `max_samples` and therefore cheap, rather than maintaining a
    /// dedicated sketch.
    pub fn p95(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut values: Vec<f64> = self.samples.iter().map(|s| s.value).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let idx = ((values.len() as f64) * 0.95).ceil() as usize;
        let idx = idx.saturating_sub(1).min(values.len() - 1);
        values[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_bound_evicts_oldest() {
        let mut window = SlidingWindow::new(3, Duration::from_secs(3600));
        let now = Utc::now();
        for i in 0..5 {
            window.push(now, i as f64);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.min(), 2.0);
        assert_eq!(window.max(), 4.0);
    }

    #[test]
    fn time_bound_evicts_stale_samples() {
        let mut window = SlidingWindow::new(1000, Duration::from_secs(60));
        let now = Utc::now();
        window.push(now - chrono::Duration::seconds(120), 1.0);
        window.push(now, 2.0);
        assert_eq!(window.len(), 1);
        assert_eq!(window.stats().mean(), 2.0);
    }

    #[test]
    fn p95_is_near_the_top_of_a_uniform_range() {
        let mut window = SlidingWindow::new(100, Duration::from_secs(3600));
        let now = Utc::now();
        for i in 1..=100 {
            window.push(now, i as f64);
        }
        assert!(window.p95() >= 94.0 && window.p95() <= 96.0);
    }

    #[test]
    fn min_max_track_eviction_of_the_current_extremum() {
        let mut window = SlidingWindow::new(3, Duration::from_secs(3600));
        let now = Utc::now();
        for v in [5.0, 1.0, 9.0, 2.0] {
            window.push(now, v);
        }
        // retained: [1.0, 9.0, 2.0] after 5.0 was evicted
        assert_eq!(window.min(), 1.0);
        assert_eq!(window.max(), 9.0);
        window.push(now, 3.0);
        // retained: [9.0, 2.0, 3.0] after 1.0 was evicted
        assert_eq!(window.min(), 2.0);
        assert_eq!(window.max(), 9.0);
    }

    #[test]
    fn incremental_stats_match_a_full_rebuild() {
        let mut window = SlidingWindow::new(5, Duration::from_secs(3600));
        let now = Utc::now();
        let mut rebuilt = WelfordStats::new();
        let values = [3.0, 7.0, 1.0, 9.0, 4.0, 8.0, 2.0];
        for (i, &v) in values.iter().enumerate() {
            window.push(now, v);
            let retained = &values[i.saturating_sub(4)..=i];
            rebuilt = WelfordStats::new();
            for &r in retained {
                rebuilt.update(r);
            }
            assert!((window.stats().mean() - rebuilt.mean()).abs() < 1e-9);
            assert!((window.stats().variance() - rebuilt.variance()).abs() < 1e-9);
        }
    }
}
