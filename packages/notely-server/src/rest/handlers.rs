//! REST handlers: the thin shell spec.md §1 scopes out of the core, kept
//! just large enough to drive the load generator and the end-to-end tests
//! (spec.md §6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use notely_core::{Account, Note, StoreError, Timestamp};
use serde_json::json;
use uuid::Uuid;

use crate::controller::DeploymentController;
use crate::storage::{AccountStore, NoteStore};

use super::dto::{AccountDto, CreateAccountRequest, CreateNoteRequest, NoteDto, UpdateAccountRequest, UpdateNoteRequest};

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub controller: Arc<DeploymentController>,
}

fn store_error_status(err: &StoreError) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if matches!(err, StoreError::Validation(_)) {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

pub async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let accounts_ok = state.accounts.health_check().await.is_ok();
    let notes_ok = NoteStore::health_check(state.controller.as_ref()).await.is_ok();
    if accounts_ok && notes_ok {
        (StatusCode::OK, Json(json!({"status": "ok", "timestamp": Utc::now().to_rfc3339()})))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "unavailable"})))
    }
}

pub async fn deploy(State(state): State<AppState>) -> StatusCode {
    match state.controller.deploy().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub async fn list_accounts(State(state): State<AppState>) -> Result<Json<Vec<AccountDto>>, StatusCode> {
    let accounts = state.accounts.list_accounts().await.map_err(|e| store_error_status(&e))?;
    Ok(Json(accounts.into_iter().map(AccountDto::from).collect()))
}

pub async fn create_account(State(state): State<AppState>, Json(req): Json<CreateAccountRequest>) -> Result<Json<AccountDto>, StatusCode> {
    if !Account::validate_name(&req.name) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let account = Account { id: Uuid::new_v4(), name: req.name, is_migrating: false };
    state.accounts.create_account(account.clone()).await.map_err(|e| store_error_status(&e))?;
    Ok(Json(account.into()))
}

pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<Json<AccountDto>, StatusCode> {
    if !Account::validate_name(&req.name) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let account = Account { id, name: req.name, is_migrating: req.is_migrating };
    state.accounts.update_account(account.clone()).await.map_err(|e| store_error_status(&e))?;
    Ok(Json(account.into()))
}

pub async fn list_notes(State(state): State<AppState>, Path(account_id): Path<Uuid>) -> Result<Json<Vec<Uuid>>, StatusCode> {
    let ids = state.controller.list_notes(account_id).await.map_err(|e| store_error_status(&e))?;
    Ok(Json(ids))
}

pub async fn get_note(State(state): State<AppState>, Path((account_id, note_id)): Path<(Uuid, Uuid)>) -> Result<Json<NoteDto>, StatusCode> {
    let note = state.controller.get_note(account_id, note_id).await.map_err(|e| store_error_status(&e))?;
    note.map(NoteDto::from).map(Json).ok_or(StatusCode::NOT_FOUND)
}

pub async fn create_note(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Json(req): Json<CreateNoteRequest>,
) -> Result<Json<NoteDto>, StatusCode> {
    if !Note::validate_content(&req.content) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let now = Timestamp::now();
    let note = Note { id: Uuid::new_v4(), creator: account_id, created_at: now, updated_at: now, content: req.content };
    state.controller.create_note(note.clone()).await.map_err(|e| store_error_status(&e))?;
    Ok(Json(note.into()))
}

pub async fn update_note(
    State(state): State<AppState>,
    Path((account_id, note_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateNoteRequest>,
) -> Result<Json<NoteDto>, StatusCode> {
    if !Note::validate_content(&req.content) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let created_at = state
        .controller
        .get_note(account_id, note_id)
        .await
        .map_err(|e| store_error_status(&e))?
        .map_or_else(Timestamp::now, |n| n.created_at);
    let note = Note { id: note_id, creator: account_id, created_at, updated_at: req.revision(), content: req.content };
    state.controller.update_note(note.clone()).await.map_err(|e| store_error_status(&e))?;
    Ok(Json(note.into()))
}

pub async fn delete_note(State(state): State<AppState>, Path((account_id, note_id)): Path<(Uuid, Uuid)>) -> StatusCode {
    match state.controller.delete_note(account_id, note_id).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => store_error_status(&e),
    }
}
