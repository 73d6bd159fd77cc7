//! `SQLite`-backed `AccountStore`/`NoteStore`, against the schemas spec.md
//! §6 declares. Two shards -- legacy and new -- are two independent
//! databases opened against the same schema; which one a given
//! `SqliteNoteStore` wraps is a property of the caller, not of this module.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use notely_core::{Account, Note, StoreError, Timestamp};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::traits::{AccountStore, NoteStore};
use crate::retry::retry_with_backoff;

/// Bounded retry policy for a busy/locked `SQLite` connection (spec.md §7).
const RETRY_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(10);

/// Opens (creating if absent) a `SQLite` database in WAL mode and applies
/// the schema from spec.md §6. Shared by both store flavors since each
/// physical `.db` file holds exactly one of the two tables it cares about
/// relevant to it, plus the other lying dormant -- simpler than splitting
/// connection setup per table.
async fn open_pool(path: &Path) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("create data dir: {e}")))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Backend(anyhow::anyhow!("open {}: {e}", path.display())))?;

    Ok(pool)
}

fn map_sqlx_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.message().contains("locked") || db_err.message().contains("busy") {
            return StoreError::Transient(db_err.message().to_string());
        }
    }
    StoreError::Backend(anyhow::anyhow!(err))
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    /// # Errors
    ///
    /// Returns an error if the database file cannot be opened or the
    /// schema migration fails.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let pool = open_pool(path.as_ref()).await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                is_migrating BOOLEAN NOT NULL DEFAULT 0
            )",
        )
        .execute(&pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        retry_with_backoff(RETRY_ATTEMPTS, RETRY_BASE_DELAY, || async {
            let rows = sqlx::query("SELECT id, name, is_migrating FROM accounts")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
            rows.into_iter().map(row_to_account).collect()
        })
        .await
    }

    async fn get_account(&self, id: Uuid) -> Result<Account, StoreError> {
        retry_with_backoff(RETRY_ATTEMPTS, RETRY_BASE_DELAY, || async {
            let row = sqlx::query("SELECT id, name, is_migrating FROM accounts WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
            match row {
                Some(row) => row_to_account(row),
                None => Err(StoreError::AccountNotFound { id: id.to_string() }),
            }
        })
        .await
    }

    async fn create_account(&self, account: Account) -> Result<(), StoreError> {
        retry_with_backoff(RETRY_ATTEMPTS, RETRY_BASE_DELAY, || async {
            sqlx::query("INSERT INTO accounts (id, name, is_migrating) VALUES (?, ?, ?)")
                .bind(account.id.to_string())
                .bind(&account.name)
                .bind(account.is_migrating)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
            Ok(())
        })
        .await
    }

    async fn update_account(&self, account: Account) -> Result<(), StoreError> {
        retry_with_backoff(RETRY_ATTEMPTS, RETRY_BASE_DELAY, || async {
            let result = sqlx::query("UPDATE accounts SET name = ?, is_migrating = ? WHERE id = ?")
                .bind(&account.name)
                .bind(account.is_migrating)
                .bind(account.id.to_string())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::AccountNotFound { id: account.id.to_string() });
            }
            Ok(())
        })
        .await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

fn row_to_account(row: sqlx::sqlite::SqliteRow) -> Result<Account, StoreError> {
    let id_str: String = row.try_get("id").map_err(map_sqlx_err)?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| StoreError::Validation(format!("corrupt account id: {e}")))?;
    Ok(Account {
        id,
        name: row.try_get("name").map_err(map_sqlx_err)?,
        is_migrating: row.try_get("is_migrating").map_err(map_sqlx_err)?,
    })
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

pub struct SqliteNoteStore {
    pool: SqlitePool,
}

impl SqliteNoteStore {
    /// # Errors
    ///
    /// Returns an error if the database file cannot be opened or the
    /// schema migration fails.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let pool = open_pool(path.as_ref()).await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                creator TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                content TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn list_notes(&self, account_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        retry_with_backoff(RETRY_ATTEMPTS, RETRY_BASE_DELAY, || async {
            let rows = sqlx::query("SELECT id FROM notes WHERE creator = ?")
                .bind(account_id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
            rows.into_iter()
                .map(|row| {
                    let id_str: String = row.try_get("id").map_err(map_sqlx_err)?;
                    Uuid::parse_str(&id_str)
                        .map_err(|e| StoreError::Validation(format!("corrupt note id: {e}")))
                })
                .collect()
        })
        .await
    }

    async fn get_note(&self, account_id: Uuid, note_id: Uuid) -> Result<Option<Note>, StoreError> {
        retry_with_backoff(RETRY_ATTEMPTS, RETRY_BASE_DELAY, || async {
            let row = sqlx::query(
                "SELECT id, creator, created_at, updated_at, content FROM notes
                 WHERE id = ? AND creator = ?",
            )
            .bind(note_id.to_string())
            .bind(account_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
            row.map(row_to_note).transpose()
        })
        .await
    }

    async fn create_note(&self, note: Note) -> Result<(), StoreError> {
        retry_with_backoff(RETRY_ATTEMPTS, RETRY_BASE_DELAY, || async {
            sqlx::query(
                "INSERT INTO notes (id, creator, created_at, updated_at, content)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(note.id.to_string())
            .bind(note.creator.to_string())
            .bind(note.created_at.millis() as i64)
            .bind(note.updated_at.millis() as i64)
            .bind(&note.content)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
            Ok(())
        })
        .await
    }

    async fn update_note(&self, note: Note) -> Result<(), StoreError> {
        retry_with_backoff(RETRY_ATTEMPTS, RETRY_BASE_DELAY, || async {
            // Upsert: insert when absent, otherwise apply the revision-monotone
            // update only if the incoming `updated_at` is strictly greater.
            let result = sqlx::query(
                "UPDATE notes SET updated_at = ?, content = ?
                 WHERE id = ? AND creator = ? AND updated_at < ?",
            )
            .bind(note.updated_at.millis() as i64)
            .bind(&note.content)
            .bind(note.id.to_string())
            .bind(note.creator.to_string())
            .bind(note.updated_at.millis() as i64)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

            if result.rows_affected() == 0 {
                // Either the row doesn't exist yet, or the incoming revision
                // lost the race -- try an insert, ignoring a conflict on `id`
                // (which means the row exists and the revision rule rejected us).
                let _ = sqlx::query(
                    "INSERT OR IGNORE INTO notes (id, creator, created_at, updated_at, content)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(note.id.to_string())
                .bind(note.creator.to_string())
                .bind(note.created_at.millis() as i64)
                .bind(note.updated_at.millis() as i64)
                .bind(&note.content)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
            }
            Ok(())
        })
        .await
    }

    async fn delete_note(&self, account_id: Uuid, note_id: Uuid) -> Result<(), StoreError> {
        retry_with_backoff(RETRY_ATTEMPTS, RETRY_BASE_DELAY, || async {
            sqlx::query("DELETE FROM notes WHERE id = ? AND creator = ?")
                .bind(note_id.to_string())
                .bind(account_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
            Ok(())
        })
        .await
    }

    async fn count_notes(&self, account_id: Uuid) -> Result<u64, StoreError> {
        retry_with_backoff(RETRY_ATTEMPTS, RETRY_BASE_DELAY, || async {
            let row = sqlx::query("SELECT COUNT(*) AS n FROM notes WHERE creator = ?")
                .bind(account_id.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
            let n: i64 = row.try_get("n").map_err(map_sqlx_err)?;
            Ok(n as u64)
        })
        .await
    }

    async fn total_notes(&self) -> Result<u64, StoreError> {
        retry_with_backoff(RETRY_ATTEMPTS, RETRY_BASE_DELAY, || async {
            let row = sqlx::query("SELECT COUNT(*) AS n FROM notes")
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
            let n: i64 = row.try_get("n").map_err(map_sqlx_err)?;
            Ok(n as u64)
        })
        .await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

fn row_to_note(row: sqlx::sqlite::SqliteRow) -> Result<Note, StoreError> {
    let id_str: String = row.try_get("id").map_err(map_sqlx_err)?;
    let creator_str: String = row.try_get("creator").map_err(map_sqlx_err)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_err)?;
    let updated_at: i64 = row.try_get("updated_at").map_err(map_sqlx_err)?;
    Ok(Note {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| StoreError::Validation(format!("corrupt note id: {e}")))?,
        creator: Uuid::parse_str(&creator_str)
            .map_err(|e| StoreError::Validation(format!("corrupt creator id: {e}")))?,
        created_at: Timestamp(created_at as u64),
        updated_at: Timestamp(updated_at as u64),
        content: row.try_get("content").map_err(map_sqlx_err)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn account_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SqliteAccountStore::connect(dir.path().join("accounts.db")).await.unwrap();
        let account = Account { id: Uuid::new_v4(), name: "alice".to_string(), is_migrating: false };
        store.create_account(account.clone()).await.unwrap();
        assert_eq!(store.get_account(account.id).await.unwrap(), account);
    }

    #[tokio::test]
    async fn update_account_not_found() {
        let dir = tempdir().unwrap();
        let store = SqliteAccountStore::connect(dir.path().join("accounts.db")).await.unwrap();
        let account = Account { id: Uuid::new_v4(), name: "alice".to_string(), is_migrating: false };
        let err = store.update_account(account).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn note_revision_monotonicity() {
        let dir = tempdir().unwrap();
        let store = SqliteNoteStore::connect(dir.path().join("notes.db")).await.unwrap();
        let id = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let note_v1 = Note {
            id,
            creator,
            created_at: Timestamp(100),
            updated_at: Timestamp(100),
            content: "v1".to_string(),
        };
        store.create_note(note_v1.clone()).await.unwrap();

        let stale = Note { updated_at: Timestamp(50), content: "stale".to_string(), ..note_v1.clone() };
        store.update_note(stale).await.unwrap();
        assert_eq!(store.get_note(creator, id).await.unwrap().unwrap().content, "v1");

        let fresh = Note { updated_at: Timestamp(200), content: "v2".to_string(), ..note_v1 };
        store.update_note(fresh).await.unwrap();
        assert_eq!(store.get_note(creator, id).await.unwrap().unwrap().content, "v2");
    }

    #[tokio::test]
    async fn delete_note_idempotent() {
        let dir = tempdir().unwrap();
        let store = SqliteNoteStore::connect(dir.path().join("notes.db")).await.unwrap();
        let id = Uuid::new_v4();
        let creator = Uuid::new_v4();
        store.delete_note(creator, id).await.unwrap();
        store.delete_note(creator, id).await.unwrap();
    }

    #[tokio::test]
    async fn count_and_total() {
        let dir = tempdir().unwrap();
        let store = SqliteNoteStore::connect(dir.path().join("notes.db")).await.unwrap();
        let creator = Uuid::new_v4();
        for i in 0..3u64 {
            store
                .create_note(Note {
                    id: Uuid::new_v4(),
                    creator,
                    created_at: Timestamp(i),
                    updated_at: Timestamp(i),
                    content: format!("note-{i}"),
                })
                .await
                .unwrap();
        }
        assert_eq!(store.count_notes(creator).await.unwrap(), 3);
        assert_eq!(store.total_notes().await.unwrap(), 3);
    }
}
