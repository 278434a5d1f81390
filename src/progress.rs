//! Progress-callback trait for per-page rendering events.
//!
//! Inject an [`Arc<dyn RenderProgressCallback>`] via
//! [`crate::config::RasterConfigBuilder::progress_callback`] to receive events
//! as a renderer rasterises each page. The CLI forwards them to an indicatif
//! progress bar; library callers can forward them anywhere.
//!
//! Events only fire on a cache miss. A cache hit never touches the renderer,
//! so a callback that saw no events for a request knows it was served from
//! memory.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2png::{RasterConfig, RenderProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl RenderProgressCallback for CountingCallback {
//!     fn on_page_rendered(&self, _page: usize, _total: usize, _png_len: usize) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { rendered: AtomicUsize::new(0) });
//!
//! let config = RasterConfig::builder()
//!     .progress_callback(counter as Arc<dyn RenderProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by a renderer backend as it processes each page.
///
/// Renders run on tokio's blocking pool, so implementations must be
/// `Send + Sync`. All methods default to no-ops.
pub trait RenderProgressCallback: Send + Sync {
    /// Called once the engine has opened the document.
    fn on_render_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after a page is rasterised and PNG-encoded.
    ///
    /// # Arguments
    /// * `page`    — 1-based ordinal
    /// * `total`   — pages in the document
    /// * `png_len` — size of the encoded PNG in bytes
    fn on_page_rendered(&self, page: usize, total: usize, png_len: usize) {
        let _ = (page, total, png_len);
    }

    /// Called once every page has been produced.
    fn on_render_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RasterConfig`].
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;
