//! Transport-level HTTP plumbing: configuration, middleware, deferred-startup
//! server lifecycle, and graceful shutdown. Shared by the Data Proxy's RPC
//! listener and the REST façade; routes and handlers live with their domains.

pub mod config;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::NetworkConfig;
pub use module::HttpServer;
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
