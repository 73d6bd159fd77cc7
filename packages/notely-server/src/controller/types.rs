//! Plain data types for the deployment state machine (spec.md §3, §4.4).

use std::time::Duration;

use thiserror::Error;

use crate::supervisor::SupervisorError;

/// `INITIAL | ROLLOUT_LAUNCH_NEW | ROLLOUT_WAIT | READY` -- exactly one at
/// any time (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStatus {
    Initial,
    RolloutLaunchNew,
    RolloutWait,
    Ready,
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("deployment already in progress")]
    AlreadyInProgress,
    #[error("no proxy available")]
    NoProxyAvailable,
    #[error("failed to launch proxy: {0}")]
    Launch(#[from] SupervisorError),
}

/// A read-only snapshot of a live proxy's record, safe to hand back to
/// callers without exposing the owned child process (spec.md §3 Proxy
/// Process Record).
#[derive(Debug, Clone)]
pub struct ProxyProcessView {
    pub id: u64,
    pub pid: u32,
    pub address: String,
    pub restart_count: u32,
}

/// `(active, elapsedSec, totalSec, percent)` during `ROLLOUT_WAIT`
/// (spec.md §4.4 `GetDeploymentProgress`).
#[derive(Debug, Clone)]
pub struct DeploymentProgress {
    pub active: u64,
    pub elapsed_secs: u64,
    pub total_secs: u64,
    pub percent: f64,
}

/// Tunable knobs for the rolling-release and crash-recovery algorithms.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub max_restarts: u32,
    pub restart_backoff_base: Duration,
    pub restart_backoff_max: Duration,
    pub rollout_wait: Duration,
    pub crash_check_interval: Duration,
    pub instrument_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            restart_backoff_base: Duration::from_millis(500),
            restart_backoff_max: Duration::from_secs(30),
            rollout_wait: Duration::from_secs(30),
            crash_check_interval: Duration::from_secs(2),
            instrument_interval: Duration::from_secs(2),
        }
    }
}
