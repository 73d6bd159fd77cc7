//! The Data Proxy: an RPC server wrapping two note stores with strict
//! per-request serialization, and the stateless client that talks to it
//! (spec.md §4.1, §4.2).

pub mod client;
pub mod migration;
pub mod server;

pub use client::{ProxyClient, ProxyRpcError};
pub use server::{ProxyState, router};
