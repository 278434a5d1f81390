//! Pipeline stages for PDF-to-PNG rasterisation.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable alone and a rendering backend can be swapped without touching
//! the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ archive
//! (URL/path) (pdfium |   (PNG)     (ZIP)
//!             pdftoppm)
//! ```
//!
//! 1. [`input`]   — read a local file or download a URL; check the PDF signature
//! 2. [`render`]  — the [`render::PageRenderer`] seam and the pdfium backend;
//!    [`engine`] locates the pdfium library, [`poppler`] shells out to `pdftoppm`
//! 3. [`encode`]  — PNG-encode each `DynamicImage`
//! 4. [`archive`] — deterministic ZIP of the encoded pages

pub mod archive;
pub mod encode;
pub mod engine;
pub mod input;
pub mod poppler;
pub mod render;
