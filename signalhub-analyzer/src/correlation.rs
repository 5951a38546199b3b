//! Cross-series Pearson correlation tracking (spec §4.G item 5). Sample
//! alignment across two independently-arriving series is left unspecified
//! by the source; this pairs each new sample of series A against the most
//! recently observed value of every other tracked series B, updating the
//! running sums in O(1) rather than replaying history.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
struct PairState {
    n: u64,
    sum_x: f64,
    sum_y: f64,
    sum_xy: f64,
    sum_x2: f64,
    sum_y2: f64,
    last_sign: Option<i8>,
}

impl PairState {
    fn update(&mut self, x: f64, y: f64) {
        self.n += 1;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xy += x * y;
        self.sum_x2 += x * x;
        self.sum_y2 += y * y;
    }

    fn r(&self) -> Option<f64> {
        let n = self.n as f64;
        let numerator = n * self.sum_xy - self.sum_x * self.sum_y;
        let denom_x = n * self.sum_x2 - self.sum_x * self.sum_x;
        let denom_y = n * self.sum_y2 - self.sum_y * self.sum_y;
        let denom = (denom_x * denom_y).sqrt();
        if denom == 0.0 {
            None
        } else {
            Some(numerator / denom)
        }
    }
}

/// A correlation-shift signal (spec §4.G: `|r| > 0.7` and a sign flip).
#[derive(Debug, Clone, Copy)]
pub struct CorrelationShift {
    pub r: f64,
}

pub struct CorrelationTracker {
    last_value: HashMap<String, f64>,
    pairs: HashMap<(String, String), PairState>,
    min_overlap: u64,
    threshold: f64,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl CorrelationTracker {
    pub fn new(min_overlap: u64, threshold: f64) -> CorrelationTracker {
        CorrelationTracker {
            last_value: HashMap::new(),
            pairs: HashMap::new(),
            min_overlap,
            threshold,
        }
    }

    /// Updates every pair involving `series` and returns the shifted pairs
    /// (series, other_series, shift), if any.
    pub fn observe(&mut self, series: &str, value: f64) -> Vec<(String, CorrelationShift)> {
        let mut shifts = Vec::new();
        let others: Vec<(String, f64)> = self
            .last_value
            .iter()
            .filter(|(k, _)| k.as_str() != series)
            .map(|(k, v)| (k.clone(), *v))
            .collect();

        for (other, other_value) in others {
            let key = pair_key(series, &other);
            let state = self.pairs.entry(key).or_default();
            state.update(value, other_value);

            if state.n < self.min_overlap {
                continue;
            }
            if let Some(r) = state.r() {
                let sign = if r >= 0.0 { 1 } else { -1 };
                let flipped = state.last_sign.is_some_and(|last| last != sign);
                state.last_sign = Some(sign);
                if r.abs() > self.threshold && flipped {
                    shifts.push((other, CorrelationShift { r }));
                }
            }
        }

        self.last_value.insert(series.to_string(), value);
        shifts
    }
}
