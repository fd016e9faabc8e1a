//! Input resolution: turn a user-supplied path or URL into a [`Document`].
//!
//! The declared kind comes from the extension of the path (or of the URL
//! path). Bytes are read fully into memory; both pdfium and the zip reader
//! work from byte slices, so nothing is staged on disk.

use crate::document::{Document, DocumentKind};
use crate::error::Doc2CastError;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a loaded document.
///
/// URLs are downloaded (bounded by `timeout_secs` and `max_bytes`); anything
/// else is treated as a local path.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<Document, Doc2CastError> {
    if input.trim().is_empty() {
        return Err(Doc2CastError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs, max_bytes).await
    } else {
        read_local(Path::new(input), max_bytes).await
    }
}

/// Read a local file after checking extension, existence and size.
async fn read_local(path: &Path, max_bytes: u64) -> Result<Document, Doc2CastError> {
    let kind = DocumentKind::from_path(path)?;
    let path_buf = path.to_path_buf();

    let meta = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) => return Err(map_io_error(e, path_buf)),
    };
    if meta.len() > max_bytes {
        return Err(Doc2CastError::DocumentTooLarge {
            name: path.display().to_string(),
            size: meta.len(),
            limit: max_bytes,
        });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| map_io_error(e, path_buf))?;

    debug!("Read local {}: {} ({} bytes)", kind, path.display(), bytes.len());
    Document::with_kind(display_name(path), kind, bytes)
}

fn map_io_error(e: std::io::Error, path: PathBuf) -> Doc2CastError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => Doc2CastError::PermissionDenied { path },
        _ => Doc2CastError::FileNotFound { path },
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Download a URL into memory, aborting once `max_bytes` is exceeded.
async fn download_url(
    url: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<Document, Doc2CastError> {
    info!("Downloading document from: {}", url);

    let filename = extract_filename(url).ok_or_else(|| Doc2CastError::InvalidInput {
        input: url.to_string(),
    })?;
    let kind = DocumentKind::from_path(Path::new(&filename))?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Doc2CastError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| map_reqwest_error(e, url, timeout_secs))?;

    if !response.status().is_success() {
        return Err(Doc2CastError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(Doc2CastError::DocumentTooLarge {
                name: filename,
                size: len,
                limit: max_bytes,
            });
        }
    }

    let mut bytes: Vec<u8> = Vec::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| map_reqwest_error(e, url, timeout_secs))?;
        bytes.extend_from_slice(&chunk);
        if bytes.len() as u64 > max_bytes {
            return Err(Doc2CastError::DocumentTooLarge {
                name: filename,
                size: bytes.len() as u64,
                limit: max_bytes,
            });
        }
    }

    info!("Downloaded {} ({} bytes)", filename, bytes.len());
    Document::with_kind(filename, kind, bytes)
}

fn map_reqwest_error(e: reqwest::Error, url: &str, timeout_secs: u64) -> Doc2CastError {
    if e.is_timeout() {
        Doc2CastError::DownloadTimeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else {
        Doc2CastError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Last path segment of the URL, if it carries an extension.
fn extract_filename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if !last.is_empty() && last.contains('.') {
        Some(last.to_string())
    } else {
        None
    }
}
