use std::net::SocketAddr;

use anyhow::Result;
use axum::{routing::get, Router};
use tracing::info;

/// Minimal liveness endpoint for uptime monitors.
pub async fn serve(port: u16) -> Result<()> {
    let app = Router::new().route("/", get(alive));

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!("Health endpoint listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn alive() -> &'static str {
    "alive"
}
