//! End-to-end tests over a real TCP socket, with the spawn kill-switch on
//! and no capture device available, so every frame is the synthetic pattern.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use doomcast_core::{ServerConfig, FRAME_HEIGHT, FRAME_WIDTH, RGB_FRAME_LEN};
use doomcast_server::SessionManager;

const IO_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server() -> (SocketAddr, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServerConfig {
        disable_spawn: true,
        session_dir: dir.path().to_path_buf(),
        framebuffer: "/nonexistent/fb9".into(),
        public_dir: dir.path().join("public"),
        ..ServerConfig::default()
    };
    let manager = Arc::new(SessionManager::new(cfg));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(doomcast_server::serve(listener, manager));
    (addr, dir)
}

/// One-shot request: write everything, read until the server closes.
async fn request(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    let mut out = Vec::new();
    timeout(IO_TIMEOUT, stream.read_to_end(&mut out))
        .await
        .expect("response timed out")
        .unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

#[tokio::test]
async fn healthz_returns_ok() {
    let (addr, _dir) = start_server().await;
    let response = request(addr, b"GET /healthz HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Length: 2\r\n"));
    assert!(response.ends_with("ok"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (addr, _dir) = start_server().await;
    let response = request(addr, b"GET /nope HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404"));
}

#[tokio::test]
async fn empty_input_body_is_400() {
    let (addr, _dir) = start_server().await;
    let response = request(
        addr,
        b"POST /input?session=0 HTTP/1.1\r\nContent-Length: 0\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 400"));
}

#[tokio::test]
async fn out_of_range_session_is_503() {
    let (addr, _dir) = start_server().await;
    let response = request(
        addr,
        b"POST /input?session=99 HTTP/1.1\r\nContent-Length: 2\r\n\r\nup",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 503"));
}

#[tokio::test]
async fn input_without_fifo_reader_is_500() {
    let (addr, _dir) = start_server().await;
    // The session's FIFO exists but nothing reads it, so delivery fails.
    let response = request(
        addr,
        b"POST /input?session=0 HTTP/1.1\r\nContent-Length: 2\r\n\r\nup",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 500"));
}

#[tokio::test]
async fn session_close_is_501() {
    let (addr, _dir) = start_server().await;
    let response = request(addr, b"POST /session/close HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 501"));
}

#[tokio::test]
async fn index_html_is_served_at_root() {
    let (addr, dir) = start_server().await;
    let public = dir.path().join("public");
    std::fs::create_dir_all(&public).unwrap();
    std::fs::write(public.join("index.html"), "<html>doomcast</html>").unwrap();

    let response = request(addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: text/html"));
    assert!(response.ends_with("<html>doomcast</html>"));
}

// ── MJPEG stream ──────────────────────────────────────────────────────────────

struct PartReader {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl PartReader {
    async fn fill(&mut self) {
        let mut chunk = [0u8; 4096];
        let n = timeout(IO_TIMEOUT, self.stream.read(&mut chunk))
            .await
            .expect("stream read timed out")
            .unwrap();
        assert!(n > 0, "stream ended early");
        self.buf.extend_from_slice(&chunk[..n]);
    }

    async fn read_until(&mut self, delim: &[u8]) -> Vec<u8> {
        loop {
            if let Some(pos) = self
                .buf
                .windows(delim.len())
                .position(|w| w == delim)
            {
                let head = self.buf[..pos].to_vec();
                self.buf.drain(..pos + delim.len());
                return head;
            }
            self.fill().await;
        }
    }

    async fn read_exact_n(&mut self, n: usize) -> Vec<u8> {
        while self.buf.len() < n {
            self.fill().await;
        }
        let out = self.buf[..n].to_vec();
        self.buf.drain(..n);
        out
    }

    /// Read one multipart frame: boundary + part headers, then the body.
    async fn next_part(&mut self) -> Vec<u8> {
        let head = self.read_until(b"\r\n\r\n").await;
        let head = String::from_utf8_lossy(&head);
        assert!(head.contains("--frame"), "part head: {head:?}");
        assert!(head.contains("Content-Type: image/jpeg"));
        let len: usize = head
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .expect("part Content-Length")
            .trim()
            .parse()
            .unwrap();
        let body = self.read_exact_n(len).await;
        assert_eq!(self.read_exact_n(2).await, b"\r\n");
        body
    }
}

#[tokio::test]
async fn mjpeg_stream_serves_the_synthetic_pattern() {
    let (addr, _dir) = start_server().await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /doom.mjpeg?session=0 HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let mut reader = PartReader {
        stream,
        buf: Vec::new(),
    };

    let head = reader.read_until(b"\r\n\r\n").await;
    let head = String::from_utf8_lossy(&head);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"), "head: {head:?}");
    assert!(head.contains("Content-Type: multipart/x-mixed-replace; boundary=frame"));
    assert!(!head.to_lowercase().contains("content-length"));

    // With no capture backend, parts must be byte-identical to locally
    // encoding the synthetic pattern at increasing counters.
    for counter in 0..2u64 {
        let part = reader.next_part().await;
        assert_eq!(&part[..2], &[0xff, 0xd8], "not a JPEG at counter {counter}");

        let decoded =
            image::load_from_memory_with_format(&part, image::ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.width(), FRAME_WIDTH as u32);
        assert_eq!(decoded.height(), FRAME_HEIGHT as u32);

        let mut expected_rgb = vec![0u8; RGB_FRAME_LEN];
        doomcast_capture::synthetic::fill(counter, &mut expected_rgb);
        let expected =
            doomcast_server::jpeg::encode_rgb(&expected_rgb, FRAME_WIDTH as u32, FRAME_HEIGHT as u32)
                .unwrap();
        assert_eq!(part, expected, "frame mismatch at counter {counter}");
    }
    // Dropping the connection is the stream's only cancellation mechanism.
}

#[tokio::test]
async fn concurrent_streams_share_one_session() {
    let (addr, _dir) = start_server().await;

    let mut a = TcpStream::connect(addr).await.unwrap();
    let mut b = TcpStream::connect(addr).await.unwrap();
    a.write_all(b"GET /doom.mjpeg?session=0 HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    b.write_all(b"GET /doom.mjpeg?session=0 HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    // Both connections must produce valid streams against the same slot.
    for stream in [a, b] {
        let mut reader = PartReader {
            stream,
            buf: Vec::new(),
        };
        let head = reader.read_until(b"\r\n\r\n").await;
        assert!(String::from_utf8_lossy(&head).starts_with("HTTP/1.1 200 OK\r\n"));
        let part = reader.next_part().await;
        let decoded =
            image::load_from_memory_with_format(&part, image::ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.width(), FRAME_WIDTH as u32);
    }
}
