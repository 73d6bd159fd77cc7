//! Entrypoint: installs the tracing subscriber, then dispatches to server
//! mode, Data Proxy child mode, or load generator mode per the parsed CLI
//! flags (spec.md §6).

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use notely_server::cli::Cli;
use notely_server::controller::{ControllerConfig, DeploymentController};
use notely_server::loadgen::{self, LoadGenConfig};
use notely_server::network::{HttpServer, NetworkConfig};
use notely_server::proxy::{router as proxy_router, ProxyState};
use notely_server::rest::{self, AppState};
use notely_server::storage::sqlite::{SqliteAccountStore, SqliteNoteStore};
use notely_server::supervisor::SupervisorConfig;
use notely_server::telemetry::TelemetryCollector;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    install_tracing(&cli.log_level);

    if cli.cli {
        tracing::error!("--cli (terminal UI) is not implemented by this build");
        return ExitCode::FAILURE;
    }

    let result = if cli.proxy {
        run_proxy(&cli).await
    } else if cli.gen {
        run_loadgen(&cli).await
    } else {
        run_server(&cli).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            ExitCode::FAILURE
        }
    }
}

fn install_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();
}

/// Data Proxy child mode: opens both shards and serves the JSON-RPC
/// listener on `--proxy-port` (spec.md §4.1).
async fn run_proxy(cli: &Cli) -> anyhow::Result<()> {
    let proxy_id = cli.proxy_id.ok_or_else(|| anyhow::anyhow!("--proxy requires --proxy-id"))?;
    let port = cli.proxy_port.ok_or_else(|| anyhow::anyhow!("--proxy requires --proxy-port"))?;

    let legacy = Arc::new(SqliteNoteStore::connect(&cli.legacy_db_path).await?);
    let new_store = Arc::new(SqliteNoteStore::connect(&cli.new_db_path).await?);
    let telemetry = Arc::new(TelemetryCollector::new(Duration::from_secs(5)));
    let _ticker = telemetry.spawn_ticker(tokio_util::sync::CancellationToken::new());

    let network = NetworkConfig { host: "127.0.0.1".to_string(), port, ..NetworkConfig::default() };
    let mut server = HttpServer::new(network);
    // The exclusive lock's critical section holds an in-flight guard on
    // this same shutdown controller, so `serve`'s post-shutdown drain
    // waits for the lock to quiesce rather than only for HTTP connections
    // to close (spec.md §4.1's single-writer guarantee must survive a
    // graceful SIGTERM mid-request).
    let shutdown = server.shutdown_controller();
    let state = Arc::new(ProxyState::new(proxy_id, legacy, new_store, telemetry, shutdown));
    server.start().await?;
    server.serve(proxy_router(state), shutdown_signal()).await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Main server mode: REST façade + Deployment Controller, which in turn
/// supervises Data Proxy children via the `--proxy` re-invocation above.
async fn run_server(cli: &Cli) -> anyhow::Result<()> {
    let accounts = Arc::new(SqliteAccountStore::connect(&cli.db_path).await?);
    let telemetry = Arc::new(TelemetryCollector::new(Duration::from_secs(5)));
    let telemetry_cancel = tokio_util::sync::CancellationToken::new();
    let _ticker = telemetry.spawn_ticker(telemetry_cancel.clone());

    let supervisor_config = SupervisorConfig::for_current_exe()?;
    let controller = Arc::new(DeploymentController::new(accounts.clone(), Arc::clone(&telemetry), supervisor_config, ControllerConfig::default()));
    controller.deploy().await?;
    controller.start_instrument();

    let app_state = AppState { accounts, controller: Arc::clone(&controller) };
    let network = NetworkConfig { host: cli.host.clone(), port: cli.port, ..NetworkConfig::default() };
    let mut server = HttpServer::new(network);
    server.start().await?;
    let result = server.serve(rest::router(app_state), shutdown_signal()).await;

    telemetry_cancel.cancel();
    controller.close().await;
    result
}

/// Load generator mode: drives `--concurrency` simulated accounts against
/// an already-running server (spec.md §4.6).
async fn run_loadgen(cli: &Cli) -> anyhow::Result<()> {
    let config = LoadGenConfig {
        account_count: cli.concurrency,
        notes_per_account: cli.notes_per_account,
        requests_per_minute: cli.rpm,
        server_address: cli.server_address.clone(),
    };

    let cancel = tokio_util::sync::CancellationToken::new();
    let run_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        run_cancel.cancel();
    });

    let report = loadgen::run(config, cancel).await;
    tracing::info!(consistency_misses = report.consistency_misses, "load generator finished");
    if report.consistency_misses > 0 {
        anyhow::bail!("{} consistency mismatches detected", report.consistency_misses);
    }
    Ok(())
}
