//! Top-level error type unifying the leaf errors at the edges: REST
//! handlers and the CLI entrypoint.

use notely_core::StoreError;
use thiserror::Error;

use crate::controller::DeployError;
use crate::proxy::ProxyRpcError;
use crate::supervisor::SupervisorError;

#[derive(Debug, Error)]
pub enum NotelyError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Proxy(#[from] ProxyRpcError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error(transparent)]
    Deploy(#[from] DeployError),
}
