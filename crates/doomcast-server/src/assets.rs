//! Static asset serving for the bundled web viewer.
//!
//! Boundary collaborator only: a relative path under the configured public
//! directory, content type guessed from the extension.

use std::path::{Component, Path};

use tokio::io::AsyncWrite;

use crate::http::write_response;

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "text/plain",
    }
}

/// Serve `rel` from under `root`. Parent components are rejected outright.
pub async fn serve_static<S>(stream: &mut S, root: &Path, rel: &str) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let rel_path = Path::new(rel.trim_start_matches('/'));
    let escapes = rel_path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir));
    if escapes {
        return write_response(stream, 404, "text/plain", b"not found").await;
    }

    let full = root.join(rel_path);
    match tokio::fs::read(&full).await {
        Ok(bytes) => write_response(stream, 200, content_type(&full), &bytes).await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            write_response(stream, 404, "text/plain", b"not found").await
        }
        Err(_) => write_response(stream, 500, "text/plain", b"read error").await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn response_for(root: &Path, rel: &str) -> String {
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        serve_static(&mut server, root, rel).await.unwrap();
        drop(server);
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut client, &mut out)
            .await
            .unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[tokio::test]
    async fn serves_files_with_guessed_content_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>hi</html>").unwrap();

        let response = response_for(dir.path(), "index.html").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/html; charset=utf-8"));
        assert!(response.ends_with("<html>hi</html>"));
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let response = response_for(dir.path(), "nope.js").await;
        assert!(response.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn parent_components_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.txt"), "fine").unwrap();
        let response = response_for(dir.path(), "../etc/passwd").await;
        assert!(response.starts_with("HTTP/1.1 404"));
    }
}
