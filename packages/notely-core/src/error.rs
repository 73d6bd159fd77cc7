//! Error kinds shared by the Account Store and Note Store contracts
//! (spec.md §6, §7). Transport, contention, and deployment-level errors are
//! declared in `notely-server` since they depend on RPC/process concepts
//! core has no business knowing about.

use thiserror::Error;

/// Errors surfaced by `AccountStore`/`NoteStore` implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `GetAccount` contract: a distinguished not-found error (spec.md §6).
    #[error("account not found: {id}")]
    AccountNotFound { id: String },

    /// Not part of the Note Store contract (`GetNote` returns `Option`), but
    /// used by callers that need a typed "no such note" failure, e.g. the
    /// REST façade's `GET /accounts/{aid}/notes/{nid}` 404 path.
    #[error("note not found: {id}")]
    NoteNotFound { id: String },

    /// Bad JSON, bad UUID, or length-validation failure (spec.md §7).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Busy/locked storage; recovered locally with backoff before bubbling
    /// up (spec.md §7).
    #[error("transient storage error: {0}")]
    Transient(String),

    /// Any other storage-backend failure, propagated verbatim.
    #[error("storage error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AccountNotFound { .. } | Self::NoteNotFound { .. })
    }
}
