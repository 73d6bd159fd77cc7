//! `TelemetryCollector`: the three tracking maps and their ticker.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use super::metrics::{Outcome, RequestMetrics, TelemetrySnapshot};

/// Central (or proxy-local) metrics store for API, proxy, and data-store
/// access. Every tracking call upserts by a stringified key and increments
/// the live window; a background ticker folds that window into the public
/// `requests_per_min`/`duration_p95_ms` fields every `tick_interval`.
#[derive(Debug)]
pub struct TelemetryCollector {
    api: DashMap<String, RequestMetrics>,
    proxy: DashMap<String, RequestMetrics>,
    datastore: DashMap<String, RequestMetrics>,
    tick_interval: Duration,
}

impl TelemetryCollector {
    #[must_use]
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            api: DashMap::new(),
            proxy: DashMap::new(),
            datastore: DashMap::new(),
            tick_interval,
        }
    }

    pub fn track_api_request(&self, method: &str, path: &str, duration_ms: f64, status: u16) {
        let key = format!("{method}:{path}:{status}");
        self.api.entry(key).or_default().record(duration_ms);
    }

    pub fn track_proxy_access(&self, op: &str, duration_ms: f64, proxy_id: u64, outcome: Outcome) {
        let key = format!("{op}:{}:{proxy_id}", outcome.as_str());
        self.proxy.entry(key).or_default().record(duration_ms);
    }

    pub fn track_datastore_access(&self, op: &str, duration_ms: f64, store_id: &str, outcome: Outcome) {
        let key = format!("{op}:{}:{store_id}", outcome.as_str());
        self.datastore.entry(key).or_default().record(duration_ms);
    }

    /// Folds every key's live window into its public snapshot fields.
    /// Called by the background ticker; exposed directly for tests that
    /// don't want to wait out a real tick interval.
    pub fn calculate_metrics(&self) {
        let seconds = self.tick_interval.as_secs_f64();
        for mut entry in self.api.iter_mut() {
            entry.tick(seconds);
        }
        for mut entry in self.proxy.iter_mut() {
            entry.tick(seconds);
        }
        for mut entry in self.datastore.iter_mut() {
            entry.tick(seconds);
        }
    }

    /// Deep-copies the current state of all three maps.
    #[must_use]
    pub fn export(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            api: self.api.iter().map(|e| (e.key().clone(), e.value().clone())).collect(),
            proxy: self.proxy.iter().map(|e| (e.key().clone(), e.value().clone())).collect(),
            datastore: self.datastore.iter().map(|e| (e.key().clone(), e.value().clone())).collect(),
        }
    }

    /// Merges an exported snapshot (e.g. from a proxy child) into this
    /// collector. Known keys add `total_count` only, leaving current-window
    /// accumulators untouched so locally-observed RPM isn't inflated by
    /// remote activity. Unknown keys are inserted with a cleared window.
    pub fn import(&self, snapshot: &TelemetrySnapshot) {
        import_into(&self.api, &snapshot.api);
        import_into(&self.proxy, &snapshot.proxy);
        import_into(&self.datastore, &snapshot.datastore);
    }

    /// Spawns the background ticker. Returns a handle the caller must
    /// retain; the ticker exits when `cancel` fires.
    pub fn spawn_ticker(self: &Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let collector = Arc::clone(self);
        let interval = self.tick_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => collector.calculate_metrics(),
                    () = cancel.cancelled() => break,
                }
            }
        })
    }
}

fn import_into(map: &DashMap<String, RequestMetrics>, incoming: &std::collections::HashMap<String, RequestMetrics>) {
    for (key, metrics) in incoming {
        let mut entry = map.entry(key.clone()).or_default();
        entry.merge_import(metrics.total_count);
    }
}
