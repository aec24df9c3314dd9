//! Axum-based HTTP server.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers;
use crate::state::GatewayState;

/// Build the application router.
pub fn router(state: Arc<GatewayState>) -> Router {
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/tools", get(handlers::list_tools))
        .route("/api/agent/estimate", post(handlers::estimate));

    #[cfg(feature = "metrics")]
    let app = app.route("/metrics", get(handlers::metrics));

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server and serve until Ctrl+C or `state.shutdown` fires.
pub async fn start_gateway(state: Arc<GatewayState>, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{port}", state.config.gateway_bind());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        model_configured = state.model_configured(),
        tools = state.tools.len(),
        "Gateway listening on {addr}"
    );

    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Resolves on Ctrl+C or external cancellation, then cancels `token` so
/// in-flight runs stop at their next iteration and return partial results.
async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                warn!(%e, "Failed to install Ctrl+C handler");
                token.cancelled().await;
            }
        },
        _ = token.cancelled() => info!("Shutdown requested"),
    }
    token.cancel();
}
