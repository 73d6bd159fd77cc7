//! Stateless RPC caller to one Data Proxy instance (spec.md §4.2).
//!
//! Carries a numeric proxy ID used purely for observability. Every call
//! injects synthetic network latency, records telemetry regardless of
//! outcome, and surfaces transport/RPC errors verbatim to the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notely_core::rpc::{method, AccountScopedParams, CountResult, GetNoteParams, GetNoteResult, ListNotesResult, RpcRequest, RpcResponse, WriteNoteParams};
use notely_core::Note;
use rand::Rng;
use thiserror::Error;
use uuid::Uuid;

use crate::telemetry::{Outcome, TelemetryCollector};

#[derive(Debug, Error)]
pub enum ProxyRpcError {
    #[error("transport error calling proxy: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("proxy returned malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("proxy rpc error: {0}")]
    Remote(String),
}

/// Talks JSON-RPC-over-HTTP to one Data Proxy child process.
#[derive(Debug)]
pub struct ProxyClient {
    pub proxy_id: u64,
    address: String,
    http: reqwest::Client,
    telemetry: Arc<TelemetryCollector>,
    next_id: AtomicU64,
}

impl ProxyClient {
    #[must_use]
    pub fn new(proxy_id: u64, address: String, telemetry: Arc<TelemetryCollector>) -> Self {
        Self { proxy_id, address, http: reqwest::Client::new(), telemetry, next_id: AtomicU64::new(1) }
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, ProxyRpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        inject_latency().await;

        let request = RpcRequest { method: method.to_string(), params, id };
        let outcome_result = self.send(&request).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let outcome = if outcome_result.is_ok() { Outcome::Success } else { Outcome::Error };
        self.telemetry.track_proxy_access(method, duration_ms, self.proxy_id, outcome);

        outcome_result
    }

    async fn send(&self, request: &RpcRequest) -> Result<serde_json::Value, ProxyRpcError> {
        let response: RpcResponse = self
            .http
            .post(&self.address)
            .json(request)
            .timeout(Duration::from_secs(30))
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(ProxyRpcError::Remote(err));
        }
        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }

    pub async fn list_notes(&self, account_id: Uuid, is_migrating: bool) -> Result<Vec<Uuid>, ProxyRpcError> {
        let params = serde_json::to_value(AccountScopedParams { account_id, is_migrating })?;
        let value = self.call(method::LIST_NOTES, params).await?;
        Ok(serde_json::from_value::<ListNotesResult>(value)?.note_ids)
    }

    pub async fn get_note(&self, account_id: Uuid, note_id: Uuid, is_migrating: bool) -> Result<Option<Note>, ProxyRpcError> {
        let params = serde_json::to_value(GetNoteParams { account_id, note_id, is_migrating })?;
        let value = self.call(method::GET_NOTE, params).await?;
        Ok(serde_json::from_value::<GetNoteResult>(value)?.note)
    }

    pub async fn create_note(&self, account_id: Uuid, note: Note, is_migrating: bool) -> Result<(), ProxyRpcError> {
        let params = serde_json::to_value(WriteNoteParams { account_id, note, is_migrating })?;
        self.call(method::CREATE_NOTE, params).await?;
        Ok(())
    }

    pub async fn update_note(&self, account_id: Uuid, note: Note, is_migrating: bool) -> Result<(), ProxyRpcError> {
        let params = serde_json::to_value(WriteNoteParams { account_id, note, is_migrating })?;
        self.call(method::UPDATE_NOTE, params).await?;
        Ok(())
    }

    pub async fn delete_note(&self, account_id: Uuid, note: Note, is_migrating: bool) -> Result<(), ProxyRpcError> {
        let params = serde_json::to_value(WriteNoteParams { account_id, note, is_migrating })?;
        self.call(method::DELETE_NOTE, params).await?;
        Ok(())
    }

    pub async fn count_notes(&self, account_id: Uuid, is_migrating: bool) -> Result<u64, ProxyRpcError> {
        let params = serde_json::to_value(AccountScopedParams { account_id, is_migrating })?;
        let value = self.call(method::COUNT_NOTES, params).await?;
        Ok(serde_json::from_value::<CountResult>(value)?.count)
    }

    pub async fn total_notes(&self) -> Result<u64, ProxyRpcError> {
        let value = self.call(method::GET_TOTAL_NOTES, serde_json::Value::Null).await?;
        Ok(serde_json::from_value::<CountResult>(value)?.count)
    }

    pub async fn ready(&self) -> Result<(), ProxyRpcError> {
        self.call(method::READY, serde_json::Value::Null).await?;
        Ok(())
    }

    pub async fn export_shard_stats(&self) -> Result<crate::telemetry::TelemetrySnapshot, ProxyRpcError> {
        let value = self.call(method::EXPORT_SHARD_STATS, serde_json::Value::Null).await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Simulates network latency between controller and proxy (spec.md §4.2):
/// every call sleeps a random 1-5ms before sending.
async fn inject_latency() {
    let millis = rand::rng().random_range(1..=5);
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
