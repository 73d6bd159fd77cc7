//! The Data Proxy's RPC server: a single `POST /` JSON-RPC handler plus
//! `GET /healthz` / `GET /ready`, serializing every data-plane call through
//! one exclusive lock (spec.md §4.1).

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use notely_core::rpc::{method, AccountScopedParams, CountResult, GetNoteParams, GetNoteResult, ListNotesResult, RpcRequest, RpcResponse, WriteNoteParams};
use tokio::sync::Mutex;
use tracing::warn;

use crate::network::{InFlightGuard, ShutdownController};
use crate::storage::NoteStore;
use crate::telemetry::{Outcome, TelemetryCollector};

use super::migration;

/// Shared state behind the Data Proxy's RPC handler.
pub struct ProxyState {
    pub proxy_id: u64,
    pub legacy: Arc<dyn NoteStore>,
    pub new_store: Arc<dyn NoteStore>,
    pub telemetry: Arc<TelemetryCollector>,
    lock: Mutex<()>,
    shutdown: Arc<ShutdownController>,
}

impl ProxyState {
    #[must_use]
    pub fn new(
        proxy_id: u64,
        legacy: Arc<dyn NoteStore>,
        new_store: Arc<dyn NoteStore>,
        telemetry: Arc<TelemetryCollector>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self { proxy_id, legacy, new_store, telemetry, lock: Mutex::new(()), shutdown }
    }

    /// Acquires the proxy's single exclusive lock, together with an
    /// in-flight guard on the server's shutdown controller. Tries a few
    /// short non-blocking attempts first so contention is observable as a
    /// distinct telemetry event before falling back to the blocking wait
    /// (spec.md §4.1, §5). Holding the in-flight guard for the lifetime of
    /// the critical section means the server's drain-on-shutdown waits for
    /// the exclusive lock to quiesce, not just for HTTP connections to
    /// close.
    async fn acquire(&self, op: &str) -> (tokio::sync::MutexGuard<'_, ()>, InFlightGuard) {
        for _ in 0..3 {
            if let Ok(guard) = self.lock.try_lock() {
                return (guard, self.shutdown.in_flight_guard());
            }
            self.telemetry.track_proxy_access(op, 0.0, self.proxy_id, Outcome::Contention);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        (self.lock.lock().await, self.shutdown.in_flight_guard())
    }

    /// Tags a store access event by which shard the op was routed to. Both
    /// shards can be touched by a single migrating write, but the dominant
    /// one -- the write's eventual destination -- is what callers care
    /// about when reading `datastore` metrics (spec.md §4.1).
    fn store_id(is_migrating: bool) -> &'static str {
        if is_migrating {
            "new"
        } else {
            "legacy"
        }
    }
}

pub fn router(state: Arc<ProxyState>) -> Router {
    let telemetry = Arc::clone(&state.telemetry);
    Router::new()
        .route("/", post(handle_rpc))
        .route("/healthz", get(healthz))
        .route("/ready", get(ready))
        .layer(axum::middleware::from_fn_with_state(telemetry, crate::network::middleware::track_metrics))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<ProxyState>>) -> StatusCode {
    match (state.legacy.health_check().await, state.new_store.health_check().await) {
        (Ok(()), Ok(())) => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn ready(State(state): State<Arc<ProxyState>>) -> StatusCode {
    healthz(State(state)).await
}

async fn handle_rpc(State(state): State<Arc<ProxyState>>, Json(req): Json<RpcRequest>) -> Json<RpcResponse> {
    let id = req.id;
    let started = Instant::now();
    let result = dispatch(&state, &req).await;
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    // Proxy-access success/error is the Proxy Client's job (spec.md
    // §4.1/§4.2); this side only reports the datastore access the op
    // actually performed. Contention is still tracked proxy-side, in
    // `acquire`.
    let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Error };
    let is_migrating = req.params.get("is_migrating").and_then(serde_json::Value::as_bool).unwrap_or(false);
    state.telemetry.track_datastore_access(&req.method, duration_ms, ProxyState::store_id(is_migrating), outcome);

    Json(match result {
        Ok(value) => RpcResponse::ok(id, value),
        Err(e) => {
            warn!(method = %req.method, error = %e, "proxy rpc failed");
            RpcResponse::err(id, e.to_string())
        }
    })
}

async fn dispatch(state: &ProxyState, req: &RpcRequest) -> anyhow::Result<serde_json::Value> {
    match req.method.as_str() {
        method::LIST_NOTES => {
            let params: AccountScopedParams = serde_json::from_value(req.params.clone())?;
            let _guard = state.acquire(&req.method).await;
            let note_ids = migration::list_notes(state.legacy.as_ref(), state.new_store.as_ref(), params.account_id, params.is_migrating).await?;
            Ok(serde_json::to_value(ListNotesResult { note_ids })?)
        }
        method::GET_NOTE => {
            let params: GetNoteParams = serde_json::from_value(req.params.clone())?;
            let _guard = state.acquire(&req.method).await;
            let note = migration::get_note(state.legacy.as_ref(), state.new_store.as_ref(), params.account_id, params.note_id, params.is_migrating).await?;
            Ok(serde_json::to_value(GetNoteResult { note })?)
        }
        method::CREATE_NOTE => {
            let params: WriteNoteParams = serde_json::from_value(req.params.clone())?;
            let _guard = state.acquire(&req.method).await;
            migration::create_note(state.legacy.as_ref(), state.new_store.as_ref(), params.note, params.is_migrating).await?;
            Ok(serde_json::Value::Null)
        }
        method::UPDATE_NOTE => {
            let params: WriteNoteParams = serde_json::from_value(req.params.clone())?;
            let _guard = state.acquire(&req.method).await;
            migration::update_note(state.legacy.as_ref(), state.new_store.as_ref(), params.account_id, params.note, params.is_migrating).await?;
            Ok(serde_json::Value::Null)
        }
        method::DELETE_NOTE => {
            let params: WriteNoteParams = serde_json::from_value(req.params.clone())?;
            let _guard = state.acquire(&req.method).await;
            migration::delete_note(state.legacy.as_ref(), state.new_store.as_ref(), params.account_id, params.note.id).await?;
            Ok(serde_json::Value::Null)
        }
        method::COUNT_NOTES => {
            let params: AccountScopedParams = serde_json::from_value(req.params.clone())?;
            let _guard = state.acquire(&req.method).await;
            let count = migration::count_notes(state.legacy.as_ref(), state.new_store.as_ref(), params.account_id, params.is_migrating).await?;
            Ok(serde_json::to_value(CountResult { count })?)
        }
        method::GET_TOTAL_NOTES => {
            let _guard = state.acquire(&req.method).await;
            let count = migration::total_notes(state.legacy.as_ref(), state.new_store.as_ref()).await?;
            Ok(serde_json::to_value(CountResult { count })?)
        }
        method::HEALTH_CHECK | method::READY => {
            state.legacy.health_check().await?;
            state.new_store.health_check().await?;
            Ok(serde_json::Value::Null)
        }
        method::EXPORT_SHARD_STATS => Ok(serde_json::to_value(state.telemetry.export())?),
        other => anyhow::bail!("unknown rpc method: {other}"),
    }
}
