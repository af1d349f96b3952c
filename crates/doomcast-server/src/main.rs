use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use doomcast_core::ServerConfig;
use doomcast_server::SessionManager;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cfg = ServerConfig::load();
    info!(
        "doomcast v{} (backend={:?}, framebuffer={})",
        env!("CARGO_PKG_VERSION"),
        cfg.mode,
        cfg.framebuffer.display()
    );

    let port = cfg.port;
    let manager = Arc::new(SessionManager::new(cfg));
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;
    info!("listening on port {port}");

    doomcast_server::serve(listener, manager).await
}
