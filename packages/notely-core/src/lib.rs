//! Notely Core -- account/note data model, revision clock, content hashing,
//! and the Data Proxy RPC wire format.
//!
//! - **Model** ([`model`]): `Account`, `Note`, and their field-level invariants.
//! - **Timestamp** ([`timestamp`]): the millisecond revision clock used as
//!   the sole concurrency control for note updates.
//! - **Error** ([`error`]): `StoreError`, the Account/Note store contract's
//!   error type.
//! - **Hash** ([`hash`]): content hashing used by the load generator.
//! - **RPC** ([`rpc`]): the `{method, params, id}` envelope shared by the
//!   Data Proxy server and its client.

pub mod error;
pub mod hash;
pub mod model;
pub mod rpc;
pub mod timestamp;

pub use error::StoreError;
pub use hash::content_hash;
pub use model::{Account, Note};
pub use timestamp::Timestamp;
