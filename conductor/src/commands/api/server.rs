//! REST API Server implementation

use anyhow::{Context, Result};
use axum::Router;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};

use super::routes::{self, AppState};
use crate::agents::AgentRegistry;
use crate::commands::config::ConductorConfig;
use crate::orchestration::Orchestrator;

/// Build the full application router: `/api/v1` routes with CORS and tracing
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    let api_routes = routes::create_routes(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    Router::new()
        .nest("/api/v1", api_routes)
        .fallback(|| async { (axum::http::StatusCode::NOT_FOUND, "Not found") })
}

/// Run the REST API server until Ctrl-C
pub async fn start_server(config: ConductorConfig, registry: AgentRegistry) -> Result<()> {
    info!("Starting Conductor REST API Server");

    let addr: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.server.bind_address()))?;

    info!("Registered agents: {}", registry.len());
    info!(
        "Concurrency: default {}, limit {}",
        config.execution.default_max_concurrency, config.execution.max_concurrency_limit
    );

    let orchestrator = Arc::new(Orchestrator::new(Arc::new(registry)));
    let state = AppState::new(orchestrator, Arc::new(config));
    let shutdown = state.shutdown.clone();
    let app = build_app(state);

    info!("Conductor API Server starting...");
    info!("  Listening: http://{}", addr);
    info!("  API:       http://{}/api/v1/", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_on(tokio::signal::ctrl_c(), shutdown))
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Server stopped");
    Ok(())
}

/// Resolve once `signal` fires, cancelling in-flight work first.
///
/// A signal that cannot be listened for never resolves, so the server keeps
/// running instead of stopping at startup.
async fn shutdown_on(signal: impl Future<Output = io::Result<()>>, shutdown: CancellationToken) {
    match signal.await {
        Ok(()) => {
            info!("Shutdown signal received, cancelling in-flight work");
            shutdown.cancel();
        }
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_cancels_in_flight_work() {
        let shutdown = CancellationToken::new();
        shutdown_on(async { Ok(()) }, shutdown.clone()).await;
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_signal_listener_failure_keeps_serving() {
        let shutdown = CancellationToken::new();
        let failed = async { Err(io::Error::other("no signal handler")) };

        let waited =
            tokio::time::timeout(Duration::from_millis(50), shutdown_on(failed, shutdown.clone())).await;
        assert!(waited.is_err());
        assert!(!shutdown.is_cancelled());
    }
}
