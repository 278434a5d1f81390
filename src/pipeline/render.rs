//! PDF rasterisation: the [`PageRenderer`] seam and its pdfium backend.
//!
//! A renderer turns PDF bytes into every page as a PNG, or fails as a whole.
//! Calls are blocking; [`crate::cache::RenderCache`] runs them inside
//! `tokio::task::spawn_blocking` because pdfium is CPU-bound and keeps
//! thread-local state that must not hop between async worker threads.

use crate::config::{Backend, RasterConfig};
use crate::error::RenderError;
use crate::output::PageImage;
use crate::pipeline::engine::{self, PDFIUM};
use crate::pipeline::{encode, input, poppler::PopplerRenderer};
use crate::progress::ProgressCallback;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// PDF points per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Converts PDF bytes into an ordered page sequence.
///
/// Implementations must return pages numbered `1..=N` in document order, or
/// an error: never a partial sequence.
pub trait PageRenderer: Send + Sync {
    /// Engine name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Rasterise every page of `pdf` at `dpi`.
    fn render(&self, pdf: &[u8], dpi: u32) -> Result<Vec<PageImage>, RenderError>;
}

/// Build the renderer selected by `config.backend`.
pub fn renderer_for(config: &RasterConfig) -> Arc<dyn PageRenderer> {
    match config.backend {
        Backend::Pdfium => Arc::new(PdfiumRenderer::from_config(config)),
        Backend::Poppler => Arc::new(PopplerRenderer::from_config(config)),
    }
}

/// Pixel size of a page at `dpi`, with the longest edge capped at
/// `max_pixels` and the aspect ratio preserved. Never returns a zero edge.
pub fn target_size(width_pt: f32, height_pt: f32, dpi: u32, max_pixels: u32) -> (i32, i32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let mut width = width_pt * scale;
    let mut height = height_pt * scale;

    let longest = width.max(height);
    if longest > max_pixels as f32 {
        let shrink = max_pixels as f32 / longest;
        width *= shrink;
        height *= shrink;
    }
    ((width.round() as i32).max(1), (height.round() as i32).max(1))
}

/// Renders through Google's pdfium via `pdfium-render`.
pub struct PdfiumRenderer {
    library_path: Option<PathBuf>,
    password: Option<String>,
    max_rendered_pixels: u32,
    progress: Option<ProgressCallback>,
}

impl PdfiumRenderer {
    pub fn from_config(config: &RasterConfig) -> Self {
        Self {
            library_path: config.pdfium_library_path.clone(),
            password: config.password.clone(),
            max_rendered_pixels: config.max_rendered_pixels,
            progress: config.progress_callback.clone(),
        }
    }
}

impl PageRenderer for PdfiumRenderer {
    fn name(&self) -> &'static str {
        PDFIUM
    }

    fn render(&self, pdf: &[u8], dpi: u32) -> Result<Vec<PageImage>, RenderError> {
        if dpi == 0 {
            return Err(RenderError::InvalidDpi { dpi });
        }
        input::sniff_pdf(pdf)?;

        let pdfium = engine::bind_pdfium(self.library_path.as_deref())?;
        let password = self.password.as_deref();

        let document = pdfium
            .load_pdf_from_byte_slice(pdf, password)
            .map_err(|e| classify_load_error(&e, password.is_some()))?;

        let pages = document.pages();
        let total = pages.len() as usize;
        info!("PDF loaded: {} pages, rendering at {} DPI", total, dpi);
        if total == 0 {
            return Err(RenderError::invalid_document("document has no pages"));
        }
        if let Some(cb) = &self.progress {
            cb.on_render_start(total);
        }

        let mut results = Vec::with_capacity(total);
        for (idx, page) in pages.iter().enumerate() {
            let ordinal = idx + 1;
            let (width, height) = target_size(
                page.width().value,
                page.height().value,
                dpi,
                self.max_rendered_pixels,
            );
            let render_config = PdfRenderConfig::new()
                .set_target_width(width)
                .set_target_height(height);

            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| RenderError::PageFailed {
                    page: ordinal,
                    detail: format!("{:?}", e),
                })?;
            let image = bitmap.as_image();
            let png = encode::encode_png(&image).map_err(|e| RenderError::PageFailed {
                page: ordinal,
                detail: format!("PNG encoding failed: {e}"),
            })?;

            debug!(
                "Rendered page {} → {}x{} px, {} bytes",
                ordinal,
                image.width(),
                image.height(),
                png.len()
            );
            if let Some(cb) = &self.progress {
                cb.on_page_rendered(ordinal, total, png.len());
            }
            results.push(PageImage::new(ordinal, png, image.width(), image.height()));
        }

        if let Some(cb) = &self.progress {
            cb.on_render_complete(total);
        }
        Ok(results)
    }
}

/// Map a pdfium load failure onto the document-level error kinds.
fn classify_load_error(e: &PdfiumError, had_password: bool) -> RenderError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        if had_password {
            RenderError::WrongPassword
        } else {
            RenderError::PasswordRequired
        }
    } else {
        RenderError::InvalidDocument { detail }
    }
}
