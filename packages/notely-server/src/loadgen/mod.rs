//! Consistency-checking load generator (spec.md §4.6): N concurrent
//! virtual accounts that hold local hashes of their own notes and detect
//! any discrepancy with the server.

mod account;
mod weights;

pub use account::AccountSimulator;
pub use weights::{select_operation, Operation};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// `{accountCount, notesPerAccount, requestsPerMinute, serverAddress}`
/// (spec.md §3 Load-Gen config).
#[derive(Debug, Clone)]
pub struct LoadGenConfig {
    pub account_count: u32,
    pub notes_per_account: u32,
    pub requests_per_minute: u32,
    pub server_address: String,
}

/// Runs one simulator task per account until `cancel` fires, waiting up to
/// a 2s grace period for all tasks to exit before abandoning stragglers
/// (spec.md §4.6 cancellation paragraph).
pub async fn run(config: LoadGenConfig, cancel: CancellationToken) -> ConsistencyReport {
    let client = Arc::new(reqwest::Client::new());
    let mismatches = Arc::new(std::sync::atomic::AtomicU64::new(0));

    let mut handles = Vec::new();
    for _ in 0..config.account_count {
        let simulator = AccountSimulator::new(Arc::clone(&client), config.clone(), Arc::clone(&mismatches));
        let child_cancel = cancel.clone();
        handles.push(tokio::spawn(async move { simulator.run(child_cancel).await }));
    }

    cancel.cancelled().await;

    let grace = tokio::time::timeout(Duration::from_secs(2), futures_join_all(handles)).await;
    if grace.is_err() {
        tracing::warn!("load generator grace period expired with tasks still running");
    }

    ConsistencyReport { consistency_misses: mismatches.load(std::sync::atomic::Ordering::Relaxed) }
}

async fn futures_join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyReport {
    pub consistency_misses: u64,
}
