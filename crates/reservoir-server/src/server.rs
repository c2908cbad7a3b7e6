use std::net::SocketAddr;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use reservoir_core::InvalidationBus;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::handlers::{
    cache::{invalidate_all, reload, stats},
    entries::{get_entry, list_entries},
    health::health_check,
    metrics::metrics_handler,
};
use crate::metrics::http_metrics_middleware;
use crate::middleware::{log_requests, propagate_request_id, set_request_id};
use crate::state::AppState;

/// Creates the router with the given application state and metrics handle.
pub fn create_router(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(set_request_id())
        .layer(propagate_request_id())
        .layer(middleware::from_fn(log_requests));

    // Router for metrics endpoint (different state)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    let app_router = Router::new()
        .route("/health", get(health_check))
        .route("/entries", get(list_entries))
        .route("/entries/{key}", get(get_entry))
        .route("/cache", delete(invalidate_all))
        .route("/cache/reload", post(reload))
        .route("/cache/stats", get(stats))
        .with_state(state);

    Router::new()
        .merge(app_router)
        .merge(metrics_router)
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(middleware_stack)
}

/// Runs the server until a shutdown signal arrives, then stops the cache.
pub async fn run_server_with_state(
    addr: SocketAddr,
    state: AppState,
    prometheus_handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = create_router(state.clone(), prometheus_handle);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    state.cache().shutdown();
    result
}

/// Publishes on `bus` every time the process receives SIGHUP.
///
/// Lets operators force a dataset reload with `kill -HUP`.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(bus: InvalidationBus) -> tokio::task::JoinHandle<()> {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                error!(error = %e, "Failed to install SIGHUP handler, reload on signal disabled");
                return;
            },
        };

        while hangup.recv().await.is_some() {
            let receivers = bus.publish();
            info!(receivers, "SIGHUP received, dataset reload requested");
        }
    })
}

#[cfg(not(unix))]
pub fn spawn_reload_on_hangup(_bus: InvalidationBus) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async {})
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
