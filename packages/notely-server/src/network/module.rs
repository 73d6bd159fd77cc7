//! Generic HTTP server with a deferred startup lifecycle, shared by the
//! Data Proxy's RPC listener and the REST façade.
//!
//! Follows the deferred startup pattern: `new()` allocates the shutdown
//! controller, `start()` binds the TCP listener, and `serve(router)` applies
//! the common middleware stack and starts accepting connections. The router
//! itself -- routes, handlers, domain state -- is assembled by the caller,
//! so this module stays ignorant of what it's serving.

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::NetworkConfig;
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use std::sync::Arc;

/// Manages the HTTP server lifecycle: bind, serve, graceful shutdown.
pub struct HttpServer {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl HttpServer {
    /// Creates a new server without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Returns a shared reference to the shutdown controller, for wiring
    /// into handlers that need to report health state.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!(%addr, bound_port = port, "listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Applies the common middleware stack and serves `router` until
    /// `shutdown` resolves.
    ///
    /// Consumes `self` because the listener is moved into the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        self,
        router: Router,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self.listener.expect("start() must be called before serve()");
        let layers = build_http_layers(&self.config);
        let router = router.layer(layers);

        self.shutdown.set_ready();

        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;

        self.shutdown.trigger_shutdown();
        let drained = self.shutdown.wait_for_drain(std::time::Duration::from_secs(30)).await;
        if !drained {
            tracing::warn!("drain timeout expired with in-flight requests remaining");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_server_without_binding() {
        let server = HttpServer::new(NetworkConfig::default());
        assert!(server.listener.is_none());
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut server = HttpServer::new(NetworkConfig::default());
        let port = server.start().await.expect("start should succeed");
        assert!(port > 0, "OS-assigned port should be > 0");
        assert!(server.listener.is_some());
    }

    #[tokio::test]
    #[should_panic(expected = "start() must be called before serve()")]
    async fn serve_panics_without_start() {
        let server = HttpServer::new(NetworkConfig::default());
        let _ = server.serve(Router::new(), std::future::pending::<()>()).await;
    }
}
