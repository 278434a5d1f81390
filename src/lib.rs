//! # edgequake-pdf2png
//!
//! Rasterise PDF pages to PNG images and package them as a ZIP archive.
//!
//! ## Why this crate?
//!
//! Turning a PDF into page images is easy to get almost right and tedious to
//! get exactly right: page order, file naming, what happens on a broken or
//! encrypted file, and not re-rendering the same document at the same
//! resolution every time a user flips back to it. This crate wraps a real PDF
//! engine (pdfium, or poppler's `pdftoppm`) behind one small trait and puts a
//! bounded, content-addressed cache in front of it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    read a local file or download from URL, check %PDF- header
//!  ├─ 2. Identify SHA-256 of the bytes → DocumentId
//!  ├─ 3. Cache    (DocumentId, dpi) → RenderedDocument, single-flight
//!  ├─ 4. Render   pdfium or pdftoppm on the blocking pool
//!  ├─ 5. Encode   DynamicImage → PNG
//!  └─ 6. Package  deterministic ZIP of page_001.png … page_NNN.png
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2png::{convert, write_archive, RasterConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RasterConfig::builder().dpi(150).build()?;
//!     let conversion = convert("document.pdf", &config).await?;
//!     println!("{} pages", conversion.page_count());
//!     write_archive(&conversion.rendered, conversion.base_name(), Path::new("out")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2png` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2png = { version = "0.1", default-features = false }
//! ```
//!
//! ## Engines
//!
//! | Backend | Needs at runtime | Notes |
//! |---------|------------------|-------|
//! | `pdfium` (default) | `libpdfium` shared library | `PDFIUM_LIB_PATH`, working dir, or system path |
//! | `poppler` | `pdftoppm` binary | `POPPLER_PATH` or `PATH` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{CacheStats, RenderCache, RenderResult};
pub use config::{Backend, RasterConfig, RasterConfigBuilder, DEFAULT_DPI, DPI_PRESETS};
pub use convert::{
    convert, convert_document, convert_from_bytes, convert_sync, write_archive,
    write_named_archive, write_page, write_pages, Conversion,
};
pub use document::{DocumentId, RenderRequest, SourceDocument};
pub use error::{Pdf2PngError, RenderError};
pub use output::{PageImage, RenderSummary, RenderedDocument};
pub use pipeline::render::{renderer_for, PageRenderer, PdfiumRenderer};
pub use pipeline::poppler::PopplerRenderer;
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback};
pub use session::Viewer;
