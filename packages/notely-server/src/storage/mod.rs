//! The Account Store and Note Store contracts (spec.md §6) and their
//! implementations: a `SQLite`-backed one for production, and an in-memory
//! one for tests and the proxy's readiness before a database is attached.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use memory::{InMemoryAccountStore, InMemoryNoteStore};
pub use traits::{AccountStore, NoteStore};
