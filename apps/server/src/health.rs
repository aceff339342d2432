//! Liveness endpoint for the hosting platform.

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Router with a single `GET /health` route.
pub fn health_router() -> Router {
    Router::new().route("/health", get(health_handler))
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Bind the health server and serve it in the background until `cancel` fires.
/// Returns the bound address (useful when `port` is 0).
pub async fn start_health_server(
    port: u16,
    cancel: CancellationToken,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("Health endpoint listening on http://{}/health", local_addr);

    let handle = tokio::spawn(async move {
        let shutdown = async move { cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, health_router())
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("Health server error: {}", e);
        }
    });

    Ok((local_addr, handle))
}
