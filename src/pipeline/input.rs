//! Input resolution: turn a user-supplied path or URL into a [`SourceDocument`].
//!
//! Both renderers load from memory, so a URL is downloaded straight into a
//! buffer and a local file is read whole. The PDF signature is checked here
//! so a mistyped path to a PNG fails with a clear message before any engine
//! is loaded.

use crate::document::SourceDocument;
use crate::error::{Pdf2PngError, RenderError};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Readers accept a `%PDF-` header anywhere in the first kilobyte.
const SIGNATURE_WINDOW: usize = 1024;
const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// `true` when the `%PDF-` signature appears in the first kilobyte.
pub fn has_pdf_signature(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(SIGNATURE_WINDOW)];
    window
        .windows(PDF_SIGNATURE.len())
        .any(|w| w == PDF_SIGNATURE)
}

/// Reject input no engine could open, before spending time loading one.
pub fn sniff_pdf(bytes: &[u8]) -> Result<(), RenderError> {
    if bytes.is_empty() {
        return Err(RenderError::invalid_document("input is empty"));
    }
    if !has_pdf_signature(bytes) {
        return Err(RenderError::invalid_document(format!(
            "missing %PDF- header (first bytes: {:?})",
            &bytes[..bytes.len().min(8)]
        )));
    }
    Ok(())
}

/// Resolve the input string to a loaded document.
///
/// If the input is a URL, download it. If it is a local file, read it.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceDocument, Pdf2PngError> {
    if input.trim().is_empty() {
        return Err(Pdf2PngError::InvalidInput {
            input: input.to_string(),
        });
    }
    let (bytes, name) = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(Path::new(input)).await?
    };

    if !has_pdf_signature(&bytes) {
        return Err(Pdf2PngError::NotAPdf {
            source_name: input.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }

    let document = SourceDocument::new(bytes, Some(name));
    debug!(
        "Resolved {} ({} bytes, id {})",
        input,
        document.len(),
        document.id().short()
    );
    Ok(document)
}

/// Read a local file, mapping I/O failures to input errors.
async fn read_local(path: &Path) -> Result<(Vec<u8>, String), Pdf2PngError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2PngError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Pdf2PngError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    Ok((bytes, name))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<(Vec<u8>, String), Pdf2PngError> {
    info!("Downloading PDF from: {}", url);

    let parsed = reqwest::Url::parse(url).map_err(|_| Pdf2PngError::InvalidInput {
        input: url.to_string(),
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2PngError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_error = |e: reqwest::Error| {
        if e.is_timeout() {
            Pdf2PngError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2PngError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(parsed.clone()).send().await.map_err(map_send_error)?;

    if !response.status().is_success() {
        return Err(Pdf2PngError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_send_error)?;
    info!("Downloaded {} bytes", bytes.len());

    Ok((bytes.to_vec(), filename_from_url(&parsed)))
}

/// Last path segment when it looks like a file name, else `downloaded.pdf`.
fn filename_from_url(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty() && last.contains('.'))
        .map(str::to_string)
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
