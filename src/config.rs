//! Configuration types for PDF-to-PNG rasterisation.
//!
//! All rendering behaviour is controlled through [`RasterConfig`], built via
//! its [`RasterConfigBuilder`]. The renderer backends and the render cache are
//! both constructed from one config so a CLI run and a library caller see the
//! same defaults.

use crate::error::Pdf2PngError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Resolution used when nothing else is configured.
pub const DEFAULT_DPI: u32 = 300;

/// Resolutions offered by interactive front-ends.
pub const DPI_PRESETS: [u32; 3] = [150, 300, 600];

/// Highest accepted resolution. A letter page at 2400 DPI is already
/// 20 400 × 26 400 px.
pub const MAX_DPI: u32 = 2400;

/// Number of rendered documents kept by the render cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 5;

/// Environment variable holding the default resolution.
pub const DPI_ENV_VAR: &str = "OUTPUT_DPI";

/// Configuration for rasterising PDFs.
///
/// # Example
/// ```rust
/// use edgequake_pdf2png::{Backend, RasterConfig};
///
/// let config = RasterConfig::builder()
///     .dpi(150)
///     .backend(Backend::Poppler)
///     .cache_capacity(10)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Clone)]
pub struct RasterConfig {
    /// Rendering resolution in dots per inch. Default: 300.
    pub dpi: u32,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 16 384.
    ///
    /// Applied after the DPI scale; the other edge shrinks proportionally.
    /// Keeps a poster-sized page at 600 DPI from allocating gigabytes.
    pub max_rendered_pixels: u32,

    /// Which rendering engine to use. Default: [`Backend::Pdfium`].
    pub backend: Backend,

    /// Explicit path to the pdfium shared library (file or directory).
    /// Falls back to `PDFIUM_LIB_PATH`, the working directory, then the
    /// system library search path.
    pub pdfium_library_path: Option<PathBuf>,

    /// Directory containing `pdftoppm`, or the binary itself.
    /// Falls back to `pdftoppm` on `PATH`.
    pub poppler_path: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// How many rendered documents the cache keeps. Default: 5.
    pub cache_capacity: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            max_rendered_pixels: 16_384,
            backend: Backend::default(),
            pdfium_library_path: None,
            poppler_path: None,
            password: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RasterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("backend", &self.backend)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("poppler_path", &self.poppler_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("cache_capacity", &self.cache_capacity)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RenderProgressCallback>"),
            )
            .finish()
    }
}

impl RasterConfig {
    /// Create a new builder for `RasterConfig`.
    pub fn builder() -> RasterConfigBuilder {
        RasterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Builder seeded with this config, for overriding a few fields and
    /// re-validating.
    pub fn into_builder(self) -> RasterConfigBuilder {
        RasterConfigBuilder { config: self }
    }

    /// Defaults overlaid with the process environment.
    ///
    /// Reads `OUTPUT_DPI`, `PDF2PNG_BACKEND`, `PDF2PNG_CACHE_CAPACITY`,
    /// `PDFIUM_LIB_PATH` and `POPPLER_PATH`. Unparseable values are logged
    /// and ignored. Call once at startup.
    pub fn from_env() -> Self {
        let mut config = Self {
            dpi: dpi_from_env_value(std::env::var(DPI_ENV_VAR).ok().as_deref()),
            ..Self::default()
        };

        if let Ok(raw) = std::env::var("PDF2PNG_BACKEND") {
            match raw.parse() {
                Ok(backend) => config.backend = backend,
                Err(e) => warn!("Ignoring PDF2PNG_BACKEND: {}", e),
            }
        }
        if let Ok(raw) = std::env::var("PDF2PNG_CACHE_CAPACITY") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.cache_capacity = n,
                _ => warn!("Ignoring PDF2PNG_CACHE_CAPACITY={:?}: expected a positive integer", raw),
            }
        }
        config.pdfium_library_path = non_empty_env_path("PDFIUM_LIB_PATH");
        config.poppler_path = non_empty_env_path("POPPLER_PATH");
        config
    }
}

/// Parse a raw `OUTPUT_DPI` value, falling back to [`DEFAULT_DPI`].
///
/// Missing, non-numeric, zero, or above-[`MAX_DPI`] values all yield the
/// default; only the invalid ones are logged.
pub fn dpi_from_env_value(raw: Option<&str>) -> u32 {
    let Some(raw) = raw else {
        return DEFAULT_DPI;
    };
    match raw.trim().parse::<u32>() {
        Ok(dpi) if (1..=MAX_DPI).contains(&dpi) => dpi,
        _ => {
            warn!(
                "{}={:?} is not a resolution between 1 and {}; using {}",
                DPI_ENV_VAR, raw, MAX_DPI, DEFAULT_DPI
            );
            DEFAULT_DPI
        }
    }
}

/// Index of `dpi` in [`DPI_PRESETS`], if it is one.
pub fn preset_index(dpi: u32) -> Option<usize> {
    DPI_PRESETS.iter().position(|&p| p == dpi)
}

fn non_empty_env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Builder for [`RasterConfig`].
#[derive(Debug)]
pub struct RasterConfigBuilder {
    config: RasterConfig,
}

impl RasterConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn poppler_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.poppler_path = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn cache_capacity(mut self, n: usize) -> Self {
        self.config.cache_capacity = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RasterConfig, Pdf2PngError> {
        let c = &self.config;
        if c.dpi == 0 || c.dpi > MAX_DPI {
            return Err(Pdf2PngError::InvalidConfig(format!(
                "DPI must be 1–{}, got {}",
                MAX_DPI, c.dpi
            )));
        }
        if c.cache_capacity == 0 {
            return Err(Pdf2PngError::InvalidConfig(
                "Cache capacity must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Rendering engine behind the [`crate::pipeline::render::PageRenderer`] seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Google's pdfium, loaded as a shared library through `pdfium-render`. (default)
    #[default]
    Pdfium,
    /// Poppler's `pdftoppm` command-line tool.
    Poppler,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Pdfium => "pdfium",
            Backend::Poppler => "poppler",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdfium" => Ok(Backend::Pdfium),
            "poppler" | "pdftoppm" => Ok(Backend::Poppler),
            other => Err(format!("unknown backend '{other}' (expected pdfium or poppler)")),
        }
    }
}
