//! Input resolution: a user-supplied path or URL → image bytes in memory.
//!
//! The processing core works on an upload (bytes plus original filename),
//! the same shape a web form delivers. This module produces that shape from
//! the command line: local files are read directly, URLs are fetched with
//! reqwest. Nothing is written to disk here, so there is no temp file to
//! clean up if resolution fails halfway.

use crate::error::NotesError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Fallback filename when a URL has no usable last path segment.
const DOWNLOADED_NAME: &str = "downloaded.png";

/// An image ready to be submitted as a [`crate::ProcessRequest`].
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    /// Filename the artifact name is derived from.
    pub filename: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to image bytes.
///
/// If the input is a URL, download it; otherwise read the local file.
/// Downloads stop as soon as the body passes `max_bytes`. Whether the bytes
/// are actually an image is decided later by the OCR stage, which has the
/// decoder.
pub async fn resolve_image(
    input: &str,
    timeout_secs: u64,
    max_bytes: usize,
) -> Result<ImageUpload, NotesError> {
    if is_url(input) {
        download_url(input, timeout_secs, max_bytes).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<ImageUpload, NotesError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(NotesError::PermissionDenied { path });
        }
        Err(_) => return Err(NotesError::FileNotFound { path }),
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    debug!("Read local image: {} ({} bytes)", path.display(), bytes.len());
    Ok(ImageUpload { bytes, filename })
}

async fn download_url(
    url: &str,
    timeout_secs: u64,
    max_bytes: usize,
) -> Result<ImageUpload, NotesError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| NotesError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            NotesError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            NotesError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let mut response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(NotesError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let too_large = || NotesError::DownloadFailed {
        url: url.to_string(),
        reason: format!("image is larger than the {max_bytes}-byte limit"),
    };

    if response
        .content_length()
        .is_some_and(|len| len > max_bytes as u64)
    {
        return Err(too_large());
    }

    // Content-Length may be absent or wrong; count what actually arrives.
    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(map_err)? {
        if !append_capped(&mut bytes, &chunk, max_bytes) {
            return Err(too_large());
        }
    }
    info!("Downloaded {} bytes", bytes.len());

    Ok(ImageUpload {
        bytes,
        filename: filename_from_url(url),
    })
}

/// Append `chunk` unless that would take `buf` past `limit` bytes.
fn append_capped(buf: &mut Vec<u8>, chunk: &[u8], limit: usize) -> bool {
    if buf.len() + chunk.len() > limit {
        return false;
    }
    buf.extend_from_slice(chunk);
    true
}

/// Take the last path segment of `url` if it looks like a filename.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    DOWNLOADED_NAME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/board.jpg"));
        assert!(is_url("http://example.com/board.jpg"));
        assert!(!is_url("/tmp/board.jpg"));
        assert!(!is_url("board.jpg"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://cdn.example.com/uploads/lecture-3.jpg?size=full"),
            "lecture-3.jpg"
        );
        assert_eq!(filename_from_url("https://example.com/"), DOWNLOADED_NAME);
        assert_eq!(filename_from_url("https://example.com/image"), DOWNLOADED_NAME);
    }

    #[tokio::test]
    async fn local_file_is_read_with_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whiteboard.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let upload = resolve_image(path.to_str().unwrap(), 5, 1024).await.unwrap();
        assert_eq!(upload.filename, "whiteboard.png");
        assert_eq!(upload.bytes, b"not really a png");
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let err = resolve_image("/nonexistent/board.png", 5, 1024).await.unwrap_err();
        assert!(matches!(err, NotesError::FileNotFound { .. }));
    }

    #[test]
    fn append_stops_at_the_limit() {
        let mut buf = Vec::new();
        assert!(append_capped(&mut buf, b"abcd", 6));
        assert!(append_capped(&mut buf, b"ef", 6));
        assert!(!append_capped(&mut buf, b"g", 6));
        assert_eq!(buf, b"abcdef");
    }

    /// Serve one canned HTTP response on a local port and return its URL.
    async fn serve_once(head: &'static str, body_len: usize) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&vec![b'x'; body_len]).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/board.png")
    }

    #[tokio::test]
    async fn declared_oversized_download_is_refused() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 64\r\nConnection: close\r\n\r\n",
            64,
        )
        .await;
        let err = resolve_image(&url, 5, 16).await.unwrap_err();
        assert!(matches!(err, NotesError::DownloadFailed { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn undeclared_oversized_download_is_cut_off() {
        let url = serve_once("HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n", 64).await;
        let err = resolve_image(&url, 5, 16).await.unwrap_err();
        assert!(matches!(err, NotesError::DownloadFailed { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn download_within_the_limit_keeps_url_filename() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 8\r\nConnection: close\r\n\r\n",
            8,
        )
        .await;
        let upload = resolve_image(&url, 5, 16).await.unwrap();
        assert_eq!(upload.bytes, b"xxxxxxxx");
        assert_eq!(upload.filename, "board.png");
    }
}
