use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use super::api::{self, RelayState, SharedState};
use super::ws;

/// Configuration for the relay server.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub dev_mode: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 3151,
            dev_mode: false,
        }
    }
}

/// Build the relay router: JSON API plus the `/ws` feed stream.
pub fn build_router(state: SharedState) -> Router {
    api::api_router()
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

/// Serve the relay until `shutdown` resolves.
///
/// Feed state changes are forwarded to WebSocket clients for the lifetime
/// of the server.
pub async fn start_relay<F>(config: RelayConfig, state: RelayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = Arc::new(state);
    let forwarder = ws::spawn_forwarder(state.feed.clone(), state.ws_tx.clone());

    let mut app = build_router(state);
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, dev = config.dev_mode, "relay listening");
    println!("floorwatch relay running at http://{}", local_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Relay server error");

    forwarder.abort();
    served
}

/// Resolves on Ctrl+C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}
