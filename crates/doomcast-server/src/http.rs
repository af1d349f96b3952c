//! Minimal hand-rolled HTTP: one request per connection, close after
//! response. Only what the routes need — no keep-alive, no chunked
//! encoding, no header preservation beyond `Content-Length`.

use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use doomcast_core::InputError;

use crate::session::SessionManager;
use crate::{assets, stream};

/// Upper bound on the request head (request line + headers).
const MAX_HEAD: usize = 8192;

/// Upper bound on an accepted request body.
const MAX_BODY: usize = 64 * 1024;

// ── Request parsing ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: String,
    pub body: Vec<u8>,
}

/// Read and parse one request.
///
/// Reads until the blank line, then drains the body up to `Content-Length`
/// when the header is present. Without the header, whatever arrived with the
/// head is the body.
pub async fn read_request<S>(stream: &mut S) -> anyhow::Result<Request>
where
    S: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let head_end = loop {
        if let Some(pos) = find_blank_line(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEAD {
            bail!("request head exceeds {MAX_HEAD} bytes");
        }
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.context("reading request")?;
        if n == 0 {
            bail!("connection closed before request head completed");
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = std::str::from_utf8(&buf[..head_end]).context("request head is not UTF-8")?;
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_owned();
    let target = parts.next().unwrap_or_default();
    if method.is_empty() || target.is_empty() {
        bail!("malformed request line {request_line:?}");
    }

    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_owned(), q.to_owned()),
        None => (target.to_owned(), String::new()),
    };

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    if content_length > MAX_BODY {
        bail!("request body of {content_length} bytes exceeds {MAX_BODY}");
    }

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.context("reading body")?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    if content_length > 0 {
        body.truncate(content_length);
    }

    Ok(Request {
        method,
        path,
        query,
        body,
    })
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// `session=<int>` out of a query string; missing or unparseable → 0,
/// matching the original server's `atoi` behavior.
pub fn parse_session_id(query: &str) -> i64 {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "session")
        .map(|(_, value)| atoi(value))
        .unwrap_or(0)
}

/// Leading-integer parse: digits (with optional sign) up to the first
/// non-digit, 0 when there are none.
fn atoi(s: &str) -> i64 {
    let s = s.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|v| sign * v).unwrap_or(0)
}

// ── Response framing ──────────────────────────────────────────────────────────

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "",
    }
}

/// Write a fully framed simple response.
pub async fn write_response<S>(
    stream: &mut S,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let header = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: {}\r\n\
         Cache-Control: no-cache\r\n\
         Connection: close\r\n\
         Content-Length: {}\r\n\
         \r\n",
        status,
        reason(status),
        content_type,
        body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await
}

async fn respond_text<S>(stream: &mut S, status: u16, body: &str) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    write_response(stream, status, "text/plain", body.as_bytes()).await
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Handle one connection end to end. Errors terminate only this connection.
pub async fn handle_connection<S>(mut stream: S, manager: Arc<SessionManager>) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let req = read_request(&mut stream).await?;
    debug!("{} {} ?{}", req.method, req.path, req.query);

    match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/healthz") => respond_text(&mut stream, 200, "ok").await?,

        ("GET", "/") => {
            assets::serve_static(&mut stream, &manager.config().public_dir, "index.html").await?
        }
        ("GET", path) if path.starts_with("/public/") => {
            let rel = &path["/public/".len()..];
            assets::serve_static(&mut stream, &manager.config().public_dir, rel).await?
        }

        ("GET", "/doom.mjpeg") => {
            let id = parse_session_id(&req.query);
            match manager.get_or_create(id) {
                Ok(session) => stream::stream_mjpeg(&mut stream, session).await,
                Err(e) => {
                    warn!("stream request rejected: {e}");
                    respond_text(&mut stream, 503, "no session").await?;
                }
            }
        }

        ("POST", "/input") => {
            let id = parse_session_id(&req.query);
            let session = match manager.get_or_create(id) {
                Ok(session) => session,
                Err(e) => {
                    warn!("input request rejected: {e}");
                    respond_text(&mut stream, 503, "no session").await?;
                    return Ok(());
                }
            };
            if req.body.is_empty() {
                respond_text(&mut stream, 400, "empty payload").await?;
            } else {
                match session.deliver_input(&req.body) {
                    Ok(()) => respond_text(&mut stream, 200, "ok").await?,
                    Err(e @ InputError::Rejected { .. }) => {
                        warn!("{e}");
                        respond_text(&mut stream, 400, "input rejected").await?;
                    }
                    Err(e @ InputError::DeliveryFailed { .. }) => {
                        warn!("{e}");
                        respond_text(&mut stream, 500, "input delivery failed").await?;
                    }
                }
            }
        }

        ("POST", "/session/close") => {
            respond_text(&mut stream, 501, "close not implemented yet").await?
        }

        _ => respond_text(&mut stream, 404, "not found").await?,
    }

    Ok(())
}
