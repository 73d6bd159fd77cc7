//! `RequestMetrics` and the outcome taxonomy tracked against it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of a tracked call. Proxy access distinguishes `Contention` from
/// `Error`; API and data-store access only ever report `Success`/`Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Error,
    Contention,
}

impl Outcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
            Outcome::Contention => "contention",
        }
    }
}

/// Metrics accumulated for one stringified key (method+path+status,
/// operation+status+proxyId, or operation+status+storeId).
///
/// `total_count` is monotone across the lifetime of the collector.
/// `requests_per_min`/`duration_p95` are snapshots from the last completed
/// tick window. The `current_*` fields are the live accumulators for the
/// window in progress and are reset every tick by `calculate_metrics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetrics {
    pub total_count: u64,
    pub requests_per_min: f64,
    pub duration_p95_ms: f64,
    #[serde(skip)]
    pub current_count: u64,
    #[serde(skip)]
    pub current_durations_ms: Vec<f64>,
}

impl RequestMetrics {
    pub(super) fn record(&mut self, duration_ms: f64) {
        self.total_count += 1;
        self.current_count += 1;
        self.current_durations_ms.push(duration_ms);
    }

    /// Folds the in-progress window into the public snapshot fields and
    /// clears the window. `tick_seconds` is the ticker interval (e.g. 5s).
    pub(super) fn tick(&mut self, tick_seconds: f64) {
        self.requests_per_min = self.current_count as f64 * (60.0 / tick_seconds);
        self.duration_p95_ms = percentile_95(&mut self.current_durations_ms);
        self.current_count = 0;
        self.current_durations_ms.clear();
    }

    /// Merges an imported snapshot of the same key: totals add, current
    /// window is left untouched so the next tick's RPM reflects only
    /// locally-observed activity (spec §4.5/§9 merge asymmetry).
    pub(super) fn merge_import(&mut self, incoming_total: u64) {
        self.total_count += incoming_total;
    }
}

fn percentile_95(durations: &mut [f64]) -> f64 {
    if durations.is_empty() {
        return 0.0;
    }
    durations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((durations.len() as f64) * 0.95).floor() as usize;
    let idx = idx.min(durations.len() - 1);
    durations[idx]
}

/// A deep-copied, point-in-time view of a collector's maps, as returned by
/// `Export` and consumed by `Import`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub api: HashMap<String, RequestMetrics>,
    pub proxy: HashMap<String, RequestMetrics>,
    pub datastore: HashMap<String, RequestMetrics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_95_empty() {
        let mut v = vec![];
        assert_eq!(percentile_95(&mut v), 0.0);
    }

    #[test]
    fn percentile_95_clamped_to_last() {
        let mut v = vec![1.0, 2.0, 3.0];
        // floor(3 * 0.95) = 2, in bounds
        assert_eq!(percentile_95(&mut v), 3.0);
    }

    #[test]
    fn record_and_tick() {
        let mut m = RequestMetrics::default();
        m.record(10.0);
        m.record(20.0);
        assert_eq!(m.total_count, 2);
        m.tick(5.0);
        assert_eq!(m.current_count, 0);
        assert!(m.current_durations_ms.is_empty());
        assert_eq!(m.requests_per_min, 2.0 * (60.0 / 5.0));
    }

    #[test]
    fn merge_import_only_touches_total() {
        let mut m = RequestMetrics::default();
        m.record(10.0);
        m.tick(5.0);
        let rpm_before = m.requests_per_min;
        m.merge_import(41);
        assert_eq!(m.total_count, 42);
        assert_eq!(m.requests_per_min, rpm_before);
    }
}
