//! Wire DTOs for the REST façade (spec.md §6).

use notely_core::{Account, Note, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountDto {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "isMigrating")]
    pub is_migrating: bool,
}

impl From<Account> for AccountDto {
    fn from(a: Account) -> Self {
        Self { id: a.id, name: a.name, is_migrating: a.is_migrating }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub name: String,
    #[serde(rename = "isMigrating")]
    pub is_migrating: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoteDto {
    pub id: Uuid,
    pub creator: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at: u64,
    #[serde(rename = "updatedAt")]
    pub updated_at: u64,
    pub content: String,
}

impl From<Note> for NoteDto {
    fn from(n: Note) -> Self {
        Self { id: n.id, creator: n.creator, created_at: n.created_at.millis(), updated_at: n.updated_at.millis(), content: n.content }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub content: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<u64>,
}

impl UpdateNoteRequest {
    #[must_use]
    pub fn revision(&self) -> Timestamp {
        self.updated_at.map_or_else(Timestamp::now, Timestamp::from)
    }
}
