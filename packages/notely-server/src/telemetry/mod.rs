//! Bounded in-memory metrics for API, proxy, and data-store access.
//!
//! Three maps keyed by stringified tuples hold [`RequestMetrics`]. A
//! background ticker periodically folds each window's raw samples into
//! `requestsPerMin`/`durationP95` and clears the window. `Export`/`Import`
//! let the deployment controller fan proxy-local counters into one central
//! collector without double-counting request-rate windows (see `Import`).

mod collector;
mod metrics;

pub use collector::TelemetryCollector;
pub use metrics::{Outcome, RequestMetrics, TelemetrySnapshot};
