//! Process Supervisor: launches, health-probes, and terminates Data Proxy
//! child processes (spec.md §4.3).

use std::net::TcpListener as StdTcpListener;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::proxy::ProxyClient;
use crate::telemetry::TelemetryCollector;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("no free port available: {0}")]
    PortUnavailable(#[from] std::io::Error),
    #[error("failed to spawn proxy child process: {0}")]
    Spawn(std::io::Error),
    #[error("proxy child did not become ready after {attempts} attempts")]
    NotReady { attempts: u32 },
}

/// Knobs for spawning and supervising a proxy child process.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Path to the current binary, re-invoked in `--proxy` mode.
    pub binary_path: std::path::PathBuf,
    pub ready_probe_attempts: u32,
    pub ready_probe_interval: Duration,
    pub graceful_shutdown_timeout: Duration,
}

impl SupervisorConfig {
    /// Builds a config pointing at the currently-running executable.
    ///
    /// # Errors
    ///
    /// Returns an error if the current executable path cannot be resolved.
    pub fn for_current_exe() -> std::io::Result<Self> {
        Ok(Self {
            binary_path: std::env::current_exe()?,
            ready_probe_attempts: 10,
            ready_probe_interval: Duration::from_secs(1),
            graceful_shutdown_timeout: Duration::from_secs(5),
        })
    }
}

/// The in-memory Proxy Process Record (spec.md §3): a live child process,
/// its RPC client, and the bookkeeping the controller needs for restarts.
pub struct ProxyHandle {
    pub id: u64,
    pub pid: u32,
    pub address: String,
    pub client: Arc<ProxyClient>,
    pub launched_at: Instant,
    pub restart_count: u32,
    child: Child,
}

impl ProxyHandle {
    /// Non-blocking liveness check (spec.md §4.3 `isRunning`).
    #[must_use]
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// SIGTERM, wait up to the configured grace period, escalate to SIGKILL.
    pub async fn shutdown(&mut self, timeout: Duration) {
        let pid = Pid::from_raw(self.pid as i32);
        if signal::kill(pid, Signal::SIGTERM).is_err() {
            // Process is already gone.
            return;
        }

        if tokio::time::timeout(timeout, self.child.wait()).await.is_err() {
            warn!(proxy_id = self.id, "graceful shutdown timed out, sending SIGKILL");
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
        }
    }
}

/// Finds a free ephemeral TCP port by binding then immediately dropping
/// the listener (spec.md §4.3's "obtains a free ephemeral TCP port").
fn free_port() -> Result<u16, SupervisorError> {
    let listener = StdTcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Spawns a proxy child at a fresh ephemeral port, streams its stdout/
/// stderr into the tracing log sink, builds a client against its address,
/// and probes `Ready` up to `ready_probe_attempts` times. Tears the child
/// down and returns an error on failed readiness (spec.md §4.3 `launch`).
pub async fn launch(
    id: u64,
    config: &SupervisorConfig,
    telemetry: Arc<TelemetryCollector>,
) -> Result<ProxyHandle, SupervisorError> {
    let port = free_port()?;
    let mut command = Command::new(&config.binary_path);
    command
        .args(["--proxy", "--proxy-id", &id.to_string(), "--proxy-port", &port.to_string()])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(SupervisorError::Spawn)?;
    let pid = child.id().unwrap_or(0);

    spawn_log_sink(id, child.stdout.take());
    spawn_log_sink(id, child.stderr.take());

    let address = format!("http://127.0.0.1:{port}/");
    let client = Arc::new(ProxyClient::new(id, address.clone(), telemetry));

    for attempt in 1..=config.ready_probe_attempts {
        if client.ready().await.is_ok() {
            info!(proxy_id = id, pid, port, "proxy ready");
            return Ok(ProxyHandle { id, pid, address, client, launched_at: Instant::now(), restart_count: 0, child });
        }
        tokio::time::sleep(config.ready_probe_interval).await;
        let _ = attempt;
    }

    let _ = child.start_kill();
    let _ = child.wait().await;
    Err(SupervisorError::NotReady { attempts: config.ready_probe_attempts })
}

/// Restart path: spawns a fresh child at a new port, reusing the same
/// binary and carrying the prior `restart_count` forward (spec.md §4.3
/// `start`, invoked by the controller's crash supervisor).
pub async fn start(
    id: u64,
    restart_count: u32,
    config: &SupervisorConfig,
    telemetry: Arc<TelemetryCollector>,
) -> Result<ProxyHandle, SupervisorError> {
    let mut handle = launch(id, config, telemetry).await?;
    handle.restart_count = restart_count + 1;
    Ok(handle)
}

fn spawn_log_sink<R>(proxy_id: u64, pipe: Option<R>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let Some(pipe) = pipe else { return };
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(proxy_id, "{line}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_port_returns_nonzero_port() {
        let port = free_port().unwrap();
        assert!(port > 0);
    }

    #[test]
    fn for_current_exe_resolves_a_path() {
        let config = SupervisorConfig::for_current_exe().unwrap();
        assert!(config.binary_path.exists());
    }
}
