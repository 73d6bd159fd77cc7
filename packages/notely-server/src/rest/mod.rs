//! REST façade: the outer surface spec.md §6 describes as a thin client of
//! the Deployment Controller and the Account Store.

mod dto;
mod handlers;

pub use handlers::AppState;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::network::middleware::track_metrics;

/// Assembles the façade's routes. Network concerns (CORS, tracing, timeout)
/// are layered on separately by `HttpServer::serve`; the per-request
/// telemetry layer is applied here since it needs the controller's
/// telemetry collector.
#[must_use]
pub fn router(state: AppState) -> Router {
    let telemetry = state.controller.telemetry();
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/deploy", post(handlers::deploy))
        .route("/accounts", get(handlers::list_accounts).post(handlers::create_account))
        .route("/accounts/{id}", put(handlers::update_account))
        .route("/accounts/{account_id}/notes", get(handlers::list_notes).post(handlers::create_note))
        .route(
            "/accounts/{account_id}/notes/{note_id}",
            get(handlers::get_note).put(handlers::update_note).delete(handlers::delete_note),
        )
        .layer(axum::middleware::from_fn_with_state(telemetry, track_metrics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerConfig, DeploymentController};
    use crate::storage::InMemoryAccountStore;
    use crate::supervisor::SupervisorConfig;
    use crate::telemetry::TelemetryCollector;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let accounts: Arc<dyn crate::storage::AccountStore> = Arc::new(InMemoryAccountStore::new());
        let telemetry = Arc::new(TelemetryCollector::new(std::time::Duration::from_secs(5)));
        let supervisor_config =
            SupervisorConfig { binary_path: "/bin/true".into(), ready_probe_attempts: 1, ready_probe_interval: std::time::Duration::from_millis(1), graceful_shutdown_timeout: std::time::Duration::from_millis(50) };
        let controller = Arc::new(DeploymentController::new(accounts.clone(), telemetry, supervisor_config, ControllerConfig::default()));
        AppState { accounts, controller }
    }

    #[tokio::test]
    async fn healthz_reports_unavailable_with_no_proxy() {
        let app = router(test_state());
        let resp = app.oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn create_account_rejects_empty_name() {
        let app = router(test_state());
        let req = Request::builder()
            .method("POST")
            .uri("/accounts")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":""}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_account_then_list_round_trips() {
        let app = router(test_state());
        let req = Request::builder()
            .method("POST")
            .uri("/accounts")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"alice"}"#))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = Request::builder().uri("/accounts").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
