//! doomcast-server — expose a legacy single-display DOOM instance as a
//! multi-session browser MJPEG stream with remote key input.
//!
//! # Architecture
//!
//! ```text
//! browser ── GET /doom.mjpeg?session=N ──► http router
//!                                             │ get_or_create(N)
//!                                             ▼
//!                                       SessionManager ──► spawn chocolate-doom
//!                                             │
//!                         ┌───────────────────┴──────────────────┐
//!                         ▼                                      ▼
//!                   FrameSource                             InputSink
//!              (framebuffer / X11 / synthetic)           (FIFO / XTEST)
//!                         │
//!                   JPEG encode ──► multipart part ──► socket, 30 Hz
//! ```
//!
//! One task per accepted connection; a streaming connection runs its
//! capture→encode→write loop until the peer hangs up.

pub mod assets;
pub mod http;
pub mod input;
pub mod jpeg;
pub mod session;
pub mod spawn;
pub mod stream;

pub use session::{Session, SessionManager};

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, warn};

/// Accept loop. Never returns under normal operation; individual connection
/// failures are logged and do not stop the server.
pub async fn serve(listener: TcpListener, manager: Arc<SessionManager>) -> anyhow::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    if let Err(e) = http::handle_connection(stream, manager).await {
                        debug!("connection from {peer}: {e:#}");
                    }
                });
            }
            Err(e) => {
                warn!("accept failed: {e}");
            }
        }
    }
}
