//! MJPEG streaming: one long-lived multipart response per connection.
//!
//! The loop runs until the peer disconnects or encoding fails; there is no
//! other stop signal. Ending a stream never ends the session, and several
//! connections may stream the same session concurrently (each captures and
//! encodes its own frames).

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::sleep;
use tracing::{debug, error};

use doomcast_core::{FRAME_INTERVAL, STREAM_BOUNDARY};

use crate::session::Session;

/// Drive capture → encode → write at the fixed cadence.
pub async fn stream_mjpeg<S>(stream: &mut S, session: Arc<Session>)
where
    S: AsyncWrite + Unpin,
{
    let header = format!(
        "HTTP/1.1 200 OK\r\n\
         Cache-Control: no-cache\r\n\
         Connection: close\r\n\
         Content-Type: multipart/x-mixed-replace; boundary={STREAM_BOUNDARY}\r\n\
         \r\n"
    );
    if stream.write_all(header.as_bytes()).await.is_err() {
        return;
    }

    loop {
        let jpeg = match session.capture_jpeg() {
            Ok(jpeg) => jpeg,
            Err(e) => {
                // Fatal for this connection only; the session lives on.
                error!("session {}: {e}", session.id());
                return;
            }
        };

        let part_header = format!(
            "--{STREAM_BOUNDARY}\r\n\
             Content-Type: image/jpeg\r\n\
             Content-Length: {}\r\n\
             \r\n",
            jpeg.len()
        );
        let write = async {
            stream.write_all(part_header.as_bytes()).await?;
            stream.write_all(&jpeg).await?;
            stream.write_all(b"\r\n").await?;
            stream.flush().await
        };
        if let Err(e) = write.await {
            debug!("stream for session {} ended: {e}", session.id());
            return;
        }

        sleep(FRAME_INTERVAL).await;
    }
}
