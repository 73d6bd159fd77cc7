//! The central migration algorithm (spec.md §4.1): how each RPC method
//! behaves differently depending on an account's `is_migrating` flag.
//!
//! Every function here assumes the caller already holds the proxy's
//! exclusive lock for the duration of the call -- these are the bodies run
//! under that lock, not the locking itself (see `server.rs`).

use std::collections::HashSet;

use notely_core::{Note, StoreError};
use uuid::Uuid;

use crate::storage::NoteStore;

pub async fn list_notes(
    legacy: &dyn NoteStore,
    new_store: &dyn NoteStore,
    account_id: Uuid,
    is_migrating: bool,
) -> Result<Vec<Uuid>, StoreError> {
    if !is_migrating {
        return legacy.list_notes(account_id).await;
    }
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for id in new_store.list_notes(account_id).await? {
        if seen.insert(id) {
            ids.push(id);
        }
    }
    for id in legacy.list_notes(account_id).await? {
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

pub async fn get_note(
    legacy: &dyn NoteStore,
    new_store: &dyn NoteStore,
    account_id: Uuid,
    note_id: Uuid,
    is_migrating: bool,
) -> Result<Option<Note>, StoreError> {
    if !is_migrating {
        return legacy.get_note(account_id, note_id).await;
    }
    if let Some(note) = new_store.get_note(account_id, note_id).await? {
        return Ok(Some(note));
    }
    legacy.get_note(account_id, note_id).await
}

pub async fn create_note(
    legacy: &dyn NoteStore,
    new_store: &dyn NoteStore,
    note: Note,
    is_migrating: bool,
) -> Result<(), StoreError> {
    if is_migrating {
        new_store.create_note(note).await
    } else {
        legacy.create_note(note).await
    }
}

/// The central algorithm (spec.md §4.1): when migrating, a note still
/// present in legacy is moved to new on its next update; once it has no
/// legacy footprint, updates land on new directly.
pub async fn update_note(
    legacy: &dyn NoteStore,
    new_store: &dyn NoteStore,
    account_id: Uuid,
    note: Note,
    is_migrating: bool,
) -> Result<(), StoreError> {
    if !is_migrating {
        return legacy.update_note(note).await;
    }

    let in_legacy = legacy.get_note(account_id, note.id).await?.is_some();
    if in_legacy {
        new_store.update_note(note.clone()).await?;
        legacy.delete_note(account_id, note.id).await?;
        Ok(())
    } else {
        new_store.update_note(note).await
    }
}

pub async fn delete_note(
    legacy: &dyn NoteStore,
    new_store: &dyn NoteStore,
    account_id: Uuid,
    note_id: Uuid,
) -> Result<(), StoreError> {
    // Both deletes are idempotent in the store contract; run both
    // unconditionally regardless of `is_migrating` since a note can have a
    // footprint in either shard at migration boundaries.
    legacy.delete_note(account_id, note_id).await?;
    new_store.delete_note(account_id, note_id).await?;
    Ok(())
}

pub async fn count_notes(
    legacy: &dyn NoteStore,
    new_store: &dyn NoteStore,
    account_id: Uuid,
    is_migrating: bool,
) -> Result<u64, StoreError> {
    if !is_migrating {
        return legacy.count_notes(account_id).await;
    }
    let legacy_count = legacy.count_notes(account_id).await?;
    let new_count = new_store.count_notes(account_id).await?;
    Ok(legacy_count + new_count)
}

pub async fn total_notes(legacy: &dyn NoteStore, new_store: &dyn NoteStore) -> Result<u64, StoreError> {
    let legacy_total = legacy.total_notes().await?;
    let new_total = new_store.total_notes().await?;
    Ok(legacy_total + new_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryNoteStore;
    use notely_core::Timestamp;

    fn note(id: Uuid, creator: Uuid, updated_at: u64, content: &str) -> Note {
        Note { id, creator, created_at: Timestamp(updated_at), updated_at: Timestamp(updated_at), content: content.to_string() }
    }

    #[tokio::test]
    async fn update_note_migrates_from_legacy_to_new() {
        let legacy = InMemoryNoteStore::new();
        let new_store = InMemoryNoteStore::new();
        let account = Uuid::new_v4();
        let id = Uuid::new_v4();
        legacy.create_note(note(id, account, 100, "v1")).await.unwrap();

        update_note(&legacy, &new_store, account, note(id, account, 200, "v2"), true).await.unwrap();

        assert!(legacy.get_note(account, id).await.unwrap().is_none());
        let moved = new_store.get_note(account, id).await.unwrap().unwrap();
        assert_eq!(moved.content, "v2");
    }

    #[tokio::test]
    async fn update_note_migration_move_enforces_revision_monotonicity() {
        let legacy = InMemoryNoteStore::new();
        let new_store = InMemoryNoteStore::new();
        let account = Uuid::new_v4();
        let id = Uuid::new_v4();
        legacy.create_note(note(id, account, 100, "v1")).await.unwrap();

        // A higher revision lands first (e.g. a racing write already moved
        // the note), then a stale update arrives and must not clobber it --
        // the move onto `new_store` goes through `update_note`, not a blind
        // `create_note` overwrite.
        new_store.create_note(note(id, account, 300, "v3")).await.unwrap();
        update_note(&legacy, &new_store, account, note(id, account, 200, "v2"), true).await.unwrap();

        assert_eq!(new_store.get_note(account, id).await.unwrap().unwrap().content, "v3");
    }

    #[tokio::test]
    async fn update_note_applies_directly_when_absent_from_legacy() {
        let legacy = InMemoryNoteStore::new();
        let new_store = InMemoryNoteStore::new();
        let account = Uuid::new_v4();
        let id = Uuid::new_v4();
        new_store.create_note(note(id, account, 100, "v1")).await.unwrap();

        update_note(&legacy, &new_store, account, note(id, account, 200, "v2"), true).await.unwrap();

        assert_eq!(new_store.get_note(account, id).await.unwrap().unwrap().content, "v2");
    }

    #[tokio::test]
    async fn update_note_not_migrating_stays_in_legacy() {
        let legacy = InMemoryNoteStore::new();
        let new_store = InMemoryNoteStore::new();
        let account = Uuid::new_v4();
        let id = Uuid::new_v4();
        legacy.create_note(note(id, account, 100, "v1")).await.unwrap();

        update_note(&legacy, &new_store, account, note(id, account, 200, "v2"), false).await.unwrap();

        assert_eq!(legacy.get_note(account, id).await.unwrap().unwrap().content, "v2");
        assert!(new_store.get_note(account, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_note_is_idempotent_across_both_stores() {
        let legacy = InMemoryNoteStore::new();
        let new_store = InMemoryNoteStore::new();
        let account = Uuid::new_v4();
        let id = Uuid::new_v4();
        legacy.create_note(note(id, account, 100, "v1")).await.unwrap();

        delete_note(&legacy, &new_store, account, id).await.unwrap();
        delete_note(&legacy, &new_store, account, id).await.unwrap();

        assert!(legacy.get_note(account, id).await.unwrap().is_none());
        assert!(new_store.get_note(account, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_notes_dedupes_preferring_new_store() {
        let legacy = InMemoryNoteStore::new();
        let new_store = InMemoryNoteStore::new();
        let account = Uuid::new_v4();
        let id = Uuid::new_v4();
        legacy.create_note(note(id, account, 100, "legacy-copy")).await.unwrap();
        new_store.create_note(note(id, account, 200, "new-copy")).await.unwrap();

        let ids = list_notes(&legacy, &new_store, account, true).await.unwrap();
        assert_eq!(ids, vec![id]);
    }

    #[tokio::test]
    async fn get_note_prefers_new_store_when_migrating() {
        let legacy = InMemoryNoteStore::new();
        let new_store = InMemoryNoteStore::new();
        let account = Uuid::new_v4();
        let id = Uuid::new_v4();
        legacy.create_note(note(id, account, 100, "legacy-copy")).await.unwrap();
        new_store.create_note(note(id, account, 200, "new-copy")).await.unwrap();

        let got = get_note(&legacy, &new_store, account, id, true).await.unwrap().unwrap();
        assert_eq!(got.content, "new-copy");
    }
}
