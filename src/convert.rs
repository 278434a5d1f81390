//! One-shot conversion entry points.
//!
//! [`convert`] resolves an input, renders it through a [`RenderCache`] and
//! returns the finished [`Conversion`]. The `write_*` functions put the
//! result on disk. Every write goes to a temporary sibling first and is then
//! renamed into place, so an interrupted run never leaves a truncated PNG or
//! ZIP under the final name.

use crate::cache::RenderCache;
use crate::config::RasterConfig;
use crate::document::SourceDocument;
use crate::error::Pdf2PngError;
use crate::output::{archive_file_name, RenderSummary, RenderedDocument};
use crate::pipeline::input;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Concurrent page writes in [`write_pages`].
const WRITE_CONCURRENCY: usize = 8;

/// A rendered document together with the source it came from.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub document: SourceDocument,
    pub rendered: Arc<RenderedDocument>,
}

impl Conversion {
    /// Stem for output names, e.g. `report` for `report.pdf`.
    pub fn base_name(&self) -> &str {
        self.document.base_name()
    }

    pub fn summary(&self) -> RenderSummary {
        self.rendered.summary(Some(self.base_name()))
    }

    pub fn page_count(&self) -> usize {
        self.rendered.page_count()
    }
}

/// Convert a PDF file or URL to PNG pages.
///
/// # Arguments
/// * `input` — Local file path or HTTP/HTTPS URL to a PDF
/// * `config` — Rasterisation configuration
///
/// # Errors
/// Input errors (missing file, download failure, not a PDF) and any
/// [`crate::RenderError`] wrapped as [`Pdf2PngError::Render`].
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &RasterConfig,
) -> Result<Conversion, Pdf2PngError> {
    let document = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let cache = RenderCache::from_config(config);
    convert_document(document, &cache, config.dpi).await
}

/// Convert PDF bytes already in memory. `name` is used for output file names.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2png::{convert_from_bytes, RasterConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let conversion = convert_from_bytes(bytes, Some("document.pdf"), &RasterConfig::default()).await?;
/// println!("{} pages", conversion.page_count());
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: impl Into<Arc<[u8]>>,
    name: Option<&str>,
    config: &RasterConfig,
) -> Result<Conversion, Pdf2PngError> {
    let document = SourceDocument::new(bytes, name.map(str::to_string));
    let cache = RenderCache::from_config(config);
    convert_document(document, &cache, config.dpi).await
}

/// Render `document` at `dpi` through a caller-owned cache.
pub async fn convert_document(
    document: SourceDocument,
    cache: &RenderCache,
    dpi: u32,
) -> Result<Conversion, Pdf2PngError> {
    let start = Instant::now();
    info!(
        "Converting {} ({} bytes) at {} DPI with {}",
        document.name().unwrap_or("<unnamed>"),
        document.len(),
        dpi,
        cache.renderer_name()
    );
    let rendered = cache.render(&document, dpi).await?;
    info!(
        "Conversion complete: {} pages in {}ms",
        rendered.page_count(),
        start.elapsed().as_millis()
    );
    Ok(Conversion { document, rendered })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &RasterConfig,
) -> Result<Conversion, Pdf2PngError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2PngError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

// ── Writers ──────────────────────────────────────────────────────────────

/// Write every page as `{base}_page_NNN.png` into `dir`.
///
/// Returns the written paths in page order.
pub async fn write_pages(
    rendered: &RenderedDocument,
    base: &str,
    dir: &Path,
) -> Result<Vec<PathBuf>, Pdf2PngError> {
    ensure_dir(dir).await?;
    let paths: Vec<PathBuf> = stream::iter(rendered.pages())
        .map(move |page| async move {
            let path = dir.join(page.file_name(Some(base)));
            atomic_write(&path, &page.png).await?;
            Ok::<_, Pdf2PngError>(path)
        })
        .buffered(WRITE_CONCURRENCY)
        .try_collect()
        .await?;
    info!("Wrote {} pages to {}", paths.len(), dir.display());
    Ok(paths)
}

/// Write page `ordinal` as `{base}_page_NNN.png` into `dir`.
pub async fn write_page(
    rendered: &RenderedDocument,
    ordinal: usize,
    base: &str,
    dir: &Path,
) -> Result<PathBuf, Pdf2PngError> {
    let page = rendered
        .page(ordinal)
        .ok_or(Pdf2PngError::PageOutOfRange {
            page: ordinal,
            total: rendered.page_count(),
        })?;
    ensure_dir(dir).await?;
    let path = dir.join(page.file_name(Some(base)));
    atomic_write(&path, &page.png).await?;
    Ok(path)
}

/// Write the cached archive as `{base}_all_pages.zip` into `dir`.
pub async fn write_archive(
    rendered: &RenderedDocument,
    base: &str,
    dir: &Path,
) -> Result<PathBuf, Pdf2PngError> {
    ensure_dir(dir).await?;
    let path = dir.join(archive_file_name(base));
    atomic_write(&path, rendered.archive()).await?;
    Ok(path)
}

/// Like [`write_archive`], but the entries are named `{base}_page_NNN.png`
/// instead of `page_NNN.png`. The archive is built fresh on each call.
pub async fn write_named_archive(
    rendered: &RenderedDocument,
    base: &str,
    dir: &Path,
) -> Result<PathBuf, Pdf2PngError> {
    let bytes = rendered.archive_with_prefix(base)?;
    ensure_dir(dir).await?;
    let path = dir.join(archive_file_name(base));
    atomic_write(&path, &bytes).await?;
    Ok(path)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn ensure_dir(dir: &Path) -> Result<(), Pdf2PngError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Pdf2PngError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

/// Write to `<name>.tmp` beside `path`, then rename over it.
async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), Pdf2PngError> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let fail = |source| Pdf2PngError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
