//! Deployment Controller: the rolling-release state machine (spec.md §4.4).
//!
//! Per spec.md §9's design note, this is one concrete type that both
//! *implements* the note-store contract the REST façade consumes and
//! *consumes* the Proxy Client handles it owns as plain fields -- no second
//! trait-object layer between the two.

mod types;

pub use types::{ControllerConfig, DeployError, DeploymentProgress, DeploymentStatus, ProxyProcessView};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use notely_core::{Note, StoreError, Timestamp};
use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::proxy::ProxyClient;
use crate::storage::{AccountStore, NoteStore};
use crate::supervisor::{self, ProxyHandle, SupervisorConfig};
use crate::telemetry::TelemetryCollector;

struct ControllerState {
    current: Option<ProxyHandle>,
    previous: Option<ProxyHandle>,
    status: DeploymentStatus,
    deploy_started_at: Option<Instant>,
}

/// Rolling-release state machine, request dispatcher, crash supervisor,
/// and telemetry fan-in point, all in one (spec.md §4.4).
pub struct DeploymentController {
    state: RwLock<ControllerState>,
    deploy_mutex: AsyncMutex<()>,
    accounts: Arc<dyn AccountStore>,
    telemetry: Arc<TelemetryCollector>,
    supervisor_config: SupervisorConfig,
    config: ControllerConfig,
    cancel: CancellationToken,
    crash_monitor_running: AtomicBool,
}

impl DeploymentController {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        telemetry: Arc<TelemetryCollector>,
        supervisor_config: SupervisorConfig,
        config: ControllerConfig,
    ) -> Self {
        Self {
            state: RwLock::new(ControllerState { current: None, previous: None, status: DeploymentStatus::Initial, deploy_started_at: None }),
            deploy_mutex: AsyncMutex::new(()),
            accounts,
            telemetry,
            supervisor_config,
            config,
            cancel: CancellationToken::new(),
            crash_monitor_running: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn status(&self) -> DeploymentStatus {
        self.state.read().status
    }

    /// The central telemetry collector backing this controller's fan-in
    /// point, for callers (the REST façade's metrics middleware) that need
    /// to record events against the same collector `ExportShardStats`
    /// feeds into.
    #[must_use]
    pub fn telemetry(&self) -> Arc<TelemetryCollector> {
        Arc::clone(&self.telemetry)
    }

    #[must_use]
    pub fn current(&self) -> Option<ProxyProcessView> {
        self.state.read().current.as_ref().map(view_of)
    }

    #[must_use]
    pub fn previous(&self) -> Option<ProxyProcessView> {
        self.state.read().previous.as_ref().map(view_of)
    }

    #[must_use]
    pub fn deployment_progress(&self) -> Option<DeploymentProgress> {
        let state = self.state.read();
        if state.status != DeploymentStatus::RolloutWait {
            return None;
        }
        let active = state.current.as_ref()?.id;
        let started = state.deploy_started_at?;
        let total_secs = self.config.rollout_wait.as_secs();
        let elapsed_secs = started.elapsed().as_secs().min(total_secs);
        let percent = if total_secs == 0 { 100.0 } else { (elapsed_secs as f64 / total_secs as f64) * 100.0 };
        Some(DeploymentProgress { active, elapsed_secs, total_secs, percent })
    }

    /// Rolling-release algorithm (spec.md §4.4 `Deploy`).
    pub async fn deploy(self: &Arc<Self>) -> Result<(), DeployError> {
        let _guard = self.deploy_mutex.try_lock().map_err(|_| DeployError::AlreadyInProgress)?;

        let existing = { self.state.read().current.as_ref().map(|h| h.id) };

        if existing.is_none() {
            self.set_status(DeploymentStatus::RolloutLaunchNew);
            match supervisor::launch(1, &self.supervisor_config, Arc::clone(&self.telemetry)).await {
                Ok(handle) => {
                    {
                        let mut state = self.state.write();
                        state.current = Some(handle);
                        state.status = DeploymentStatus::Ready;
                    }
                    self.spawn_crash_monitor();
                    Ok(())
                }
                Err(e) => {
                    self.set_status(DeploymentStatus::Initial);
                    Err(DeployError::Launch(e))
                }
            }
        } else {
            self.set_status(DeploymentStatus::RolloutLaunchNew);
            let (prev_id, prev_handle) = {
                let mut state = self.state.write();
                let current = state.current.take().expect("checked Some above");
                (current.id, current)
            };
            let new_id = prev_id + 1;

            match supervisor::launch(new_id, &self.supervisor_config, Arc::clone(&self.telemetry)).await {
                Ok(new_handle) => {
                    {
                        let mut state = self.state.write();
                        state.previous = Some(prev_handle);
                        state.current = Some(new_handle);
                        state.status = DeploymentStatus::RolloutWait;
                        state.deploy_started_at = Some(Instant::now());
                    }
                    self.spawn_rollout_timer();
                    Ok(())
                }
                Err(e) => {
                    let mut state = self.state.write();
                    state.current = Some(prev_handle);
                    state.status = DeploymentStatus::Ready;
                    Err(DeployError::Launch(e))
                }
            }
        }
    }

    fn set_status(&self, status: DeploymentStatus) {
        self.state.write().status = status;
    }

    fn spawn_rollout_timer(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(controller.config.rollout_wait) => {},
                () = controller.cancel.cancelled() => return,
            }
            let previous = { controller.state.write().previous.take() };
            if let Some(mut handle) = previous {
                handle.shutdown(controller.supervisor_config.graceful_shutdown_timeout).await;
            }
            controller.set_status(DeploymentStatus::Ready);
        });
    }

    fn spawn_crash_monitor(self: &Arc<Self>) {
        if self.crash_monitor_running.swap(true, Ordering::SeqCst) {
            return;
        }
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(controller.config.crash_check_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {},
                    () = controller.cancel.cancelled() => break,
                }
                controller.check_and_restart_current().await;
            }
        });
    }

    async fn check_and_restart_current(&self) {
        let restart_job = {
            let mut state = self.state.write();
            if let Some(handle) = state.current.as_mut() {
                if !handle.is_running() && handle.restart_count < self.config.max_restarts {
                    Some((handle.id, handle.restart_count))
                } else {
                    None
                }
            } else {
                None
            }
        };

        let Some((id, restart_count)) = restart_job else { return };

        let backoff = (self.config.restart_backoff_base * 2u32.pow(restart_count)).min(self.config.restart_backoff_max);
        tokio::time::sleep(backoff).await;

        match supervisor::start(id, restart_count, &self.supervisor_config, Arc::clone(&self.telemetry)).await {
            Ok(new_handle) => {
                info!(proxy_id = id, restart_count = new_handle.restart_count, "proxy restarted after crash");
                self.state.write().current = Some(new_handle);
            }
            Err(e) => warn!(proxy_id = id, error = %e, "proxy restart failed"),
        }
    }

    /// Telemetry fan-in: every `instrument_interval`, export current's (and
    /// previous's, if present) local counters and import them centrally
    /// (spec.md §4.4 `StartInstrument`).
    pub fn start_instrument(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(controller.config.instrument_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {},
                    () = controller.cancel.cancelled() => break,
                }
                let clients: Vec<Arc<ProxyClient>> = {
                    let state = controller.state.read();
                    [state.current.as_ref(), state.previous.as_ref()]
                        .into_iter()
                        .flatten()
                        .map(|h| Arc::clone(&h.client))
                        .collect()
                };
                for client in clients {
                    match client.export_shard_stats().await {
                        Ok(snapshot) => controller.telemetry.import(&snapshot),
                        Err(e) => warn!(error = %e, "failed to export shard stats"),
                    }
                }
            }
        });
    }

    /// Stops monitoring and shuts down both children (spec.md §4.4 `Close`).
    pub async fn close(&self) {
        self.cancel.cancel();
        let (current, previous) = {
            let mut state = self.state.write();
            (state.current.take(), state.previous.take())
        };
        let timeout = self.supervisor_config.graceful_shutdown_timeout;
        if let Some(mut handle) = current {
            handle.shutdown(timeout).await;
        }
        if let Some(mut handle) = previous {
            handle.shutdown(timeout).await;
        }
    }

    async fn is_migrating(&self, account_id: Uuid) -> bool {
        match self.accounts.get_account(account_id).await {
            Ok(account) => account.is_migrating,
            Err(e) => {
                warn!(%account_id, error = %e, "account lookup failed, defaulting is_migrating=false");
                false
            }
        }
    }

    /// Request dispatch rule (spec.md §4.4): current only if previous is
    /// absent, uniform random choice if both exist, error if neither.
    fn dispatch_client(&self) -> Result<Arc<ProxyClient>, DeployError> {
        let state = self.state.read();
        match (&state.current, &state.previous) {
            (Some(current), Some(previous)) => {
                if rand::rng().random_bool(0.5) {
                    Ok(Arc::clone(&current.client))
                } else {
                    Ok(Arc::clone(&previous.client))
                }
            }
            (Some(current), None) => Ok(Arc::clone(&current.client)),
            (None, _) => Err(DeployError::NoProxyAvailable),
        }
    }
}

fn view_of(handle: &ProxyHandle) -> ProxyProcessView {
    ProxyProcessView { id: handle.id, pid: handle.pid, address: handle.address.clone(), restart_count: handle.restart_count }
}

fn to_store_error<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(anyhow::anyhow!(e.to_string()))
}

#[async_trait]
impl NoteStore for DeploymentController {
    async fn list_notes(&self, account_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let is_migrating = self.is_migrating(account_id).await;
        let client = self.dispatch_client().map_err(to_store_error)?;
        client.list_notes(account_id, is_migrating).await.map_err(to_store_error)
    }

    async fn get_note(&self, account_id: Uuid, note_id: Uuid) -> Result<Option<Note>, StoreError> {
        let is_migrating = self.is_migrating(account_id).await;
        let client = self.dispatch_client().map_err(to_store_error)?;
        client.get_note(account_id, note_id, is_migrating).await.map_err(to_store_error)
    }

    async fn create_note(&self, note: Note) -> Result<(), StoreError> {
        let is_migrating = self.is_migrating(note.creator).await;
        let client = self.dispatch_client().map_err(to_store_error)?;
        let account_id = note.creator;
        client.create_note(account_id, note, is_migrating).await.map_err(to_store_error)
    }

    async fn update_note(&self, note: Note) -> Result<(), StoreError> {
        let is_migrating = self.is_migrating(note.creator).await;
        let client = self.dispatch_client().map_err(to_store_error)?;
        let account_id = note.creator;
        client.update_note(account_id, note, is_migrating).await.map_err(to_store_error)
    }

    async fn delete_note(&self, account_id: Uuid, note_id: Uuid) -> Result<(), StoreError> {
        let is_migrating = self.is_migrating(account_id).await;
        let client = self.dispatch_client().map_err(to_store_error)?;
        let placeholder = Note { id: note_id, creator: account_id, created_at: Timestamp(0), updated_at: Timestamp(0), content: String::new() };
        client.delete_note(account_id, placeholder, is_migrating).await.map_err(to_store_error)
    }

    async fn count_notes(&self, account_id: Uuid) -> Result<u64, StoreError> {
        let is_migrating = self.is_migrating(account_id).await;
        let client = self.dispatch_client().map_err(to_store_error)?;
        client.count_notes(account_id, is_migrating).await.map_err(to_store_error)
    }

    async fn total_notes(&self) -> Result<u64, StoreError> {
        let client = self.dispatch_client().map_err(to_store_error)?;
        client.total_notes().await.map_err(to_store_error)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let client = self.dispatch_client().map_err(to_store_error)?;
        client.ready().await.map_err(to_store_error)
    }

    async fn close(&self) -> Result<(), StoreError> {
        DeploymentController::close(self).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryAccountStore;
    use notely_core::Account;

    fn test_controller() -> Arc<DeploymentController> {
        let accounts: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::new());
        let telemetry = Arc::new(TelemetryCollector::new(std::time::Duration::from_secs(5)));
        let supervisor_config = SupervisorConfig { binary_path: "/bin/true".into(), ready_probe_attempts: 1, ready_probe_interval: std::time::Duration::from_millis(1), graceful_shutdown_timeout: std::time::Duration::from_millis(50) };
        Arc::new(DeploymentController::new(accounts, telemetry, supervisor_config, ControllerConfig::default()))
    }

    #[test]
    fn starts_in_initial_status_with_no_proxies() {
        let controller = test_controller();
        assert_eq!(controller.status(), DeploymentStatus::Initial);
        assert!(controller.current().is_none());
        assert!(controller.previous().is_none());
    }

    #[tokio::test]
    async fn dispatch_fails_with_no_proxy_available() {
        let controller = test_controller();
        let err = controller.dispatch_client().unwrap_err();
        assert!(matches!(err, DeployError::NoProxyAvailable));
    }

    #[tokio::test]
    async fn is_migrating_defaults_false_on_missing_account() {
        let controller = test_controller();
        assert!(!controller.is_migrating(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn is_migrating_reflects_account_flag() {
        let accounts: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::new());
        let account = Account { id: Uuid::new_v4(), name: "a".into(), is_migrating: true };
        accounts.create_account(account.clone()).await.unwrap();
        let telemetry = Arc::new(TelemetryCollector::new(std::time::Duration::from_secs(5)));
        let supervisor_config = SupervisorConfig { binary_path: "/bin/true".into(), ready_probe_attempts: 1, ready_probe_interval: std::time::Duration::from_millis(1), graceful_shutdown_timeout: std::time::Duration::from_millis(50) };
        let controller = DeploymentController::new(accounts, telemetry, supervisor_config, ControllerConfig::default());
        assert!(controller.is_migrating(account.id).await);
    }

    #[tokio::test]
    async fn deploy_fails_fast_when_already_in_progress() {
        let controller = test_controller();
        let _guard = controller.deploy_mutex.try_lock().unwrap();
        let err = controller.deploy().await.unwrap_err();
        assert!(matches!(err, DeployError::AlreadyInProgress));
    }

    /// Crash recovery (spec.md §4.4 / §8 scenario 5): a proxy that exits
    /// unexpectedly is restarted by the crash monitor within a handful of
    /// ticks, with its restart count advanced.
    #[tokio::test]
    async fn crash_monitor_restarts_a_killed_proxy() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("NOTELY_LEGACY_DB_PATH", dir.path().join("legacy.db"));
        std::env::set_var("NOTELY_NEW_DB_PATH", dir.path().join("new.db"));

        let accounts: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::new());
        let telemetry = Arc::new(TelemetryCollector::new(std::time::Duration::from_secs(5)));
        let supervisor_config = SupervisorConfig {
            binary_path: std::path::PathBuf::from(std::env::var("CARGO_BIN_EXE_notely").unwrap()),
            ready_probe_attempts: 20,
            ready_probe_interval: std::time::Duration::from_millis(200),
            graceful_shutdown_timeout: std::time::Duration::from_secs(2),
        };
        let config = ControllerConfig { crash_check_interval: std::time::Duration::from_millis(200), ..ControllerConfig::default() };
        let controller = Arc::new(DeploymentController::new(accounts, telemetry, supervisor_config, config));

        controller.deploy().await.expect("initial deploy should succeed");

        // Tear the child down directly while the controller still considers
        // it `current`, simulating a crash the crash monitor hasn't noticed
        // yet.
        let mut handle = {
            let mut state = controller.state.write();
            state.current.take().expect("a proxy should be running")
        };
        handle.shutdown(std::time::Duration::from_secs(2)).await;
        {
            let mut state = controller.state.write();
            state.current = Some(handle);
        }

        let restarted = tokio::time::timeout(std::time::Duration::from_secs(10), async {
            loop {
                if controller.current().is_some_and(|view| view.restart_count > 0) {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        })
        .await;

        assert!(restarted.is_ok(), "crash monitor should restart the proxy within a few ticks");
        controller.close().await;
    }
}
