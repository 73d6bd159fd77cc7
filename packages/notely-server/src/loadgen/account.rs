//! Per-account simulator: exercises the REST surface and tracks local
//! content hashes to detect server/client divergence (spec.md §4.6).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use notely_core::content_hash;
use parking_lot::RwLock;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use super::weights::{select_operation, Operation};
use super::LoadGenConfig;

#[derive(Serialize)]
struct CreateAccountBody<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct AccountBody {
    id: Uuid,
}

#[derive(Serialize)]
struct NoteBody<'a> {
    content: &'a str,
    #[serde(rename = "updatedAt")]
    updated_at: Option<u64>,
}

#[derive(Deserialize)]
struct NoteResponse {
    id: Uuid,
    content: String,
}

/// One virtual account: creates itself, seeds notes, then loops forever
/// at `60_000 / rpm` ms picking a weighted operation until cancelled.
pub struct AccountSimulator {
    client: Arc<reqwest::Client>,
    config: LoadGenConfig,
    mismatches: Arc<AtomicU64>,
    expected_hashes: RwLock<HashMap<Uuid, String>>,
}

impl AccountSimulator {
    #[must_use]
    pub fn new(client: Arc<reqwest::Client>, config: LoadGenConfig, mismatches: Arc<AtomicU64>) -> Self {
        Self { client, config, mismatches, expected_hashes: RwLock::new(HashMap::new()) }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let Some(account_id) = self.create_account().await else { return };
        self.seed_notes(account_id).await;

        let tick_ms = (60_000u64 / u64::from(self.config.requests_per_minute.max(1))).max(1);
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(tick_ms));

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = cancel.cancelled() => break,
            }
            self.tick(account_id).await;
        }
    }

    async fn create_account(&self) -> Option<Uuid> {
        let url = format!("{}/accounts", self.config.server_address);
        let body = CreateAccountBody { name: &format!("loadgen-{}", Uuid::new_v4()) };
        match self.client.post(&url).json(&body).send().await {
            Ok(resp) => match resp.json::<AccountBody>().await {
                Ok(account) => Some(account.id),
                Err(e) => {
                    warn!(error = %e, "failed to decode created account");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to create simulated account");
                None
            }
        }
    }

    async fn seed_notes(&self, account_id: Uuid) {
        for i in 0..self.config.notes_per_account {
            self.create_note(account_id, &format!("seed-note-{i}")).await;
        }
    }

    async fn tick(&self, account_id: Uuid) {
        let current = self.expected_hashes.read().len() as u32;
        match select_operation(current, self.config.notes_per_account) {
            Operation::Create => self.op_create(account_id).await,
            Operation::Read => self.op_read(account_id).await,
            Operation::Update => self.op_update(account_id).await,
            Operation::Delete => self.op_delete(account_id).await,
            Operation::List => self.op_list(account_id).await,
        }
    }

    async fn op_create(&self, account_id: Uuid) {
        if (self.expected_hashes.read().len() as u32) >= self.config.notes_per_account {
            return;
        }
        self.create_note(account_id, "new content").await;
    }

    async fn create_note(&self, account_id: Uuid, content: &str) {
        let url = format!("{}/accounts/{account_id}/notes", self.config.server_address);
        let body = NoteBody { content, updated_at: None };
        match self.client.post(&url).json(&body).send().await {
            Ok(resp) => match resp.json::<NoteResponse>().await {
                Ok(note) => {
                    self.expected_hashes.write().insert(note.id, content_hash(&note.content));
                }
                Err(e) => warn!(error = %e, "failed to decode created note"),
            },
            Err(e) => warn!(error = %e, "failed to create note"),
        }
    }

    fn pick_tracked(&self) -> Option<Uuid> {
        self.expected_hashes.read().keys().choose(&mut rand::rng()).copied()
    }

    async fn op_update(&self, account_id: Uuid) {
        let Some(note_id) = self.pick_tracked() else { return };
        let content = format!("updated-{}", Uuid::new_v4());
        let updated_at = notely_core::Timestamp::now().millis();
        let url = format!("{}/accounts/{account_id}/notes/{note_id}", self.config.server_address);
        let body = NoteBody { content: &content, updated_at: Some(updated_at) };

        match self.client.put(&url).json(&body).send().await {
            Ok(resp) => match resp.json::<NoteResponse>().await {
                Ok(note) => {
                    self.expected_hashes.write().insert(note_id, content_hash(&note.content));
                }
                Err(e) => warn!(error = %e, "failed to decode updated note"),
            },
            Err(e) => warn!(error = %e, "failed to update note"),
        }
    }

    async fn op_read(&self, account_id: Uuid) {
        let Some(note_id) = self.pick_tracked() else { return };
        let expected = self.expected_hashes.read().get(&note_id).cloned();
        let Some(expected) = expected else { return };

        let url = format!("{}/accounts/{account_id}/notes/{note_id}", self.config.server_address);
        match self.client.get(&url).send().await {
            Ok(resp) => match resp.json::<NoteResponse>().await {
                Ok(note) => {
                    let actual = content_hash(&note.content);
                    if actual != expected {
                        self.mismatches.fetch_add(1, Ordering::Relaxed);
                        warn!(%account_id, %note_id, "consistency mismatch detected");
                    }
                }
                Err(e) => warn!(error = %e, "failed to decode read note"),
            },
            Err(e) => warn!(error = %e, "failed to read note"),
        }
    }

    async fn op_delete(&self, account_id: Uuid) {
        let Some(note_id) = self.pick_tracked() else { return };
        let url = format!("{}/accounts/{account_id}/notes/{note_id}", self.config.server_address);
        if let Err(e) = self.client.delete(&url).send().await {
            warn!(error = %e, "failed to delete note");
            return;
        }
        self.expected_hashes.write().remove(&note_id);
    }

    async fn op_list(&self, account_id: Uuid) {
        let url = format!("{}/accounts/{account_id}/notes", self.config.server_address);
        let server_ids: Vec<Uuid> = match self.client.get(&url).send().await {
            Ok(resp) => match resp.json().await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(error = %e, "failed to decode note id list");
                    return;
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to list notes");
                return;
            }
        };

        for note_id in server_ids {
            let expected = self.expected_hashes.read().get(&note_id).cloned();
            let Some(expected) = expected else { continue };
            let note_url = format!("{}/accounts/{account_id}/notes/{note_id}", self.config.server_address);
            if let Ok(resp) = self.client.get(&note_url).send().await {
                if let Ok(note) = resp.json::<NoteResponse>().await {
                    if content_hash(&note.content) != expected {
                        self.mismatches.fetch_add(1, Ordering::Relaxed);
                        warn!(%account_id, %note_id, "consistency mismatch detected during list verification");
                    }
                }
            }
        }
    }
}
