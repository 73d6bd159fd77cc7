//! `AccountStore` and `NoteStore`: the two persistence contracts spec.md §6
//! names as external collaborators. The core comprises everything that
//! consumes these interfaces; the engine behind them (SQLite schema,
//! locking, WAL) is out of scope and is specified only by this contract.

use async_trait::async_trait;
use notely_core::{Account, Note, StoreError};
use uuid::Uuid;

/// Persistent CRUD over accounts, including the `is_migrating` directive.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Returns `StoreError::AccountNotFound` when absent -- this is the one
    /// distinguished not-found error in the contract (spec.md §6).
    async fn get_account(&self, id: Uuid) -> Result<Account, StoreError>;

    async fn create_account(&self, account: Account) -> Result<(), StoreError>;

    async fn update_account(&self, account: Account) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError>;
}

/// Persistent per-shard CRUD over notes. A single shard (legacy or new) has
/// no notion of `is_migrating` -- that routing decision is made by the Data
/// Proxy (spec.md §4.1), not by the store.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn list_notes(&self, account_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    async fn get_note(&self, account_id: Uuid, note_id: Uuid) -> Result<Option<Note>, StoreError>;

    async fn create_note(&self, note: Note) -> Result<(), StoreError>;

    /// Enforces revision monotonicity: no row change if the incoming
    /// `updated_at` is less than or equal to the stored one (spec.md §6).
    async fn update_note(&self, note: Note) -> Result<(), StoreError>;

    /// Idempotent: no error when the row is already absent (spec.md §6).
    async fn delete_note(&self, account_id: Uuid, note_id: Uuid) -> Result<(), StoreError>;

    async fn count_notes(&self, account_id: Uuid) -> Result<u64, StoreError>;

    async fn total_notes(&self) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError>;
}
