//! Error types for the edgequake-pdf2png library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`RenderError`] — a render of one `(document, dpi)` request failed
//!   (malformed PDF, engine missing, a page that would not rasterise). It is
//!   `Clone` so the render cache can hand the same failure to every caller
//!   that was waiting on the request, and it is what
//!   [`crate::cache::RenderCache::get_or_render`] returns in its `Err` arm.
//!
//! * [`Pdf2PngError`] — **Fatal** for a top-level entry point: the input could
//!   not be resolved, the configuration is invalid, or the output could not
//!   be written. Render failures are wrapped via [`Pdf2PngError::Render`].
//!
//! Neither type is ever mixed with page data: a render either yields every
//! page or one of these errors.

use std::path::PathBuf;
use thiserror::Error;

/// A failed render of a single [`crate::document::RenderRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The bytes are not a PDF the engine can open.
    #[error("Input is not a valid PDF: {detail}")]
    InvalidDocument { detail: String },

    /// Resolution must be a positive number of dots per inch.
    #[error("Invalid resolution: {dpi} DPI (must be greater than zero)")]
    InvalidDpi { dpi: u32 },

    /// The PDF is encrypted and no password was configured.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was configured but the engine rejected it.
    #[error("Wrong password for encrypted PDF")]
    WrongPassword,

    /// The rendering engine is missing or cannot be loaded.
    #[error(
        "The {engine} rendering engine is not available: {detail}\n\n\
This is usually an environment problem, not a problem with the PDF:\n\
  • pdfium:  set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library next to the binary.\n\
  • poppler: install poppler-utils (pdftoppm) or set POPPLER_PATH to its bin directory.\n"
    )]
    EngineUnavailable { engine: String, detail: String },

    /// The engine was found but exited or failed unexpectedly.
    #[error("The {engine} rendering engine failed: {detail}")]
    EngineFailed { engine: String, detail: String },

    /// One page could not be rasterised or encoded; the whole render is void.
    #[error("Rasterisation failed for page {page}: {detail}")]
    PageFailed { page: usize, detail: String },

    /// The ZIP archive could not be assembled.
    #[error("Failed to package pages into an archive: {detail}")]
    Archive { detail: String },

    /// Unexpected internal error (panicked task, broken renderer contract).
    #[error("Internal error: {detail}")]
    Internal { detail: String },
}

impl RenderError {
    /// Shorthand for [`RenderError::InvalidDocument`].
    pub fn invalid_document(detail: impl Into<String>) -> Self {
        Self::InvalidDocument {
            detail: detail.into(),
        }
    }

    /// Shorthand for [`RenderError::Internal`].
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// `true` when the failure points at the execution environment rather
    /// than at the document. Retrying the same request will keep failing
    /// until the environment is fixed.
    pub fn is_environmental(&self) -> bool {
        matches!(
            self,
            RenderError::EngineUnavailable { .. } | RenderError::EngineFailed { .. }
        )
    }
}

/// All fatal errors returned by the edgequake-pdf2png entry points.
#[derive(Debug, Error)]
pub enum Pdf2PngError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input was read, but it is not a PDF.
    #[error("'{source_name}' is not a PDF\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    // ── Selection errors ──────────────────────────────────────────────────
    /// Requested page ordinal exceeds the rendered page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The render itself failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_unavailable_names_the_environment() {
        let e = RenderError::EngineUnavailable {
            engine: "poppler".into(),
            detail: "pdftoppm: No such file or directory".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("poppler"), "got: {msg}");
        assert!(msg.contains("environment"), "got: {msg}");
        assert!(msg.contains("POPPLER_PATH"), "got: {msg}");
        assert!(e.is_environmental());
    }

    #[test]
    fn invalid_document_is_not_environmental() {
        let e = RenderError::invalid_document("empty input");
        assert!(!e.is_environmental());
        assert!(e.to_string().contains("empty input"));
    }

    #[test]
    fn page_failed_display() {
        let e = RenderError::PageFailed {
            page: 3,
            detail: "bitmap allocation failed".into(),
        };
        assert!(e.to_string().contains("page 3"));
    }

    #[test]
    fn render_error_converts_transparently() {
        let fatal: Pdf2PngError = RenderError::WrongPassword.into();
        assert_eq!(fatal.to_string(), RenderError::WrongPassword.to_string());
    }

    #[test]
    fn page_out_of_range_display() {
        let e = Pdf2PngError::PageOutOfRange { page: 9, total: 3 };
        assert!(e.to_string().contains("Page 9"));
        assert!(e.to_string().contains("3 pages"));
    }
}
