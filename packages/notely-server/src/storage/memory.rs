//! In-memory `AccountStore`/`NoteStore` implementations used by unit tests
//! and by the proxy before it is wired to a real `SQLite` pool.

use std::collections::HashMap;

use async_trait::async_trait;
use notely_core::{Account, Note, StoreError};
use parking_lot::RwLock;
use uuid::Uuid;

use super::traits::{AccountStore, NoteStore};

#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl InMemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.accounts.read().values().cloned().collect())
    }

    async fn get_account(&self, id: Uuid) -> Result<Account, StoreError> {
        self.accounts
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::AccountNotFound { id: id.to_string() })
    }

    async fn create_account(&self, account: Account) -> Result<(), StoreError> {
        self.accounts.write().insert(account.id, account);
        Ok(())
    }

    async fn update_account(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write();
        if !accounts.contains_key(&account.id) {
            return Err(StoreError::AccountNotFound { id: account.id.to_string() });
        }
        accounts.insert(account.id, account);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryNoteStore {
    notes: RwLock<HashMap<Uuid, Note>>,
}

impl InMemoryNoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn list_notes(&self, account_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .notes
            .read()
            .values()
            .filter(|n| n.creator == account_id)
            .map(|n| n.id)
            .collect())
    }

    async fn get_note(&self, account_id: Uuid, note_id: Uuid) -> Result<Option<Note>, StoreError> {
        Ok(self
            .notes
            .read()
            .get(&note_id)
            .filter(|n| n.creator == account_id)
            .cloned())
    }

    async fn create_note(&self, note: Note) -> Result<(), StoreError> {
        self.notes.write().insert(note.id, note);
        Ok(())
    }

    async fn update_note(&self, note: Note) -> Result<(), StoreError> {
        let mut notes = self.notes.write();
        match notes.get(&note.id) {
            Some(existing) if !existing.accepts_update(note.updated_at) => {}
            _ => {
                notes.insert(note.id, note);
            }
        }
        Ok(())
    }

    async fn delete_note(&self, account_id: Uuid, note_id: Uuid) -> Result<(), StoreError> {
        let mut notes = self.notes.write();
        if notes.get(&note_id).is_some_and(|n| n.creator == account_id) {
            notes.remove(&note_id);
        }
        Ok(())
    }

    async fn count_notes(&self, account_id: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .notes
            .read()
            .values()
            .filter(|n| n.creator == account_id)
            .count() as u64)
    }

    async fn total_notes(&self) -> Result<u64, StoreError> {
        Ok(self.notes.read().len() as u64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
