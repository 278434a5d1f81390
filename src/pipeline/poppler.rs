//! Poppler backend: rasterise with the `pdftoppm` command-line tool.
//!
//! `pdftoppm` reads a file and writes one PNG per page named
//! `<prefix>-<n>.png`, zero-padding `<n>` to the width of the page count.
//! Everything happens inside a [`tempfile::TempDir`] that is removed when the
//! call returns, whether it succeeded or not.
//!
//! Exit status 1 means the document could not be opened and 3 means a
//! permissions (password) problem. Anything else is an engine failure.

use crate::config::RasterConfig;
use crate::error::RenderError;
use crate::output::PageImage;
use crate::pipeline::render::PageRenderer;
use crate::pipeline::{encode, input};
use crate::progress::ProgressCallback;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

const POPPLER: &str = "poppler";
const OUTPUT_PREFIX: &str = "page";

/// Renders by shelling out to poppler's `pdftoppm`.
pub struct PopplerRenderer {
    binary: PathBuf,
    password: Option<String>,
    progress: Option<ProgressCallback>,
}

impl PopplerRenderer {
    pub fn from_config(config: &RasterConfig) -> Self {
        Self {
            binary: pdftoppm_binary(config.poppler_path.as_deref()),
            password: config.password.clone(),
            progress: config.progress_callback.clone(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, pdf_path: &Path, prefix: &Path, dpi: u32) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-png").arg("-r").arg(dpi.to_string());
        if let Some(pw) = &self.password {
            cmd.arg("-upw").arg(pw);
        }
        cmd.arg(pdf_path).arg(prefix);
        cmd
    }

    /// Read the page files `pdftoppm` left in `dir`, in order, reporting
    /// each one to the progress callback.
    fn load_pages(&self, dir: &Path) -> Result<Vec<PageImage>, RenderError> {
        let files = collect_pages(dir)?;
        let total = files.len();
        if total == 0 {
            return Err(RenderError::invalid_document("document has no pages"));
        }
        if let Some(cb) = &self.progress {
            cb.on_render_start(total);
        }

        let mut pages = Vec::with_capacity(total);
        for (idx, path) in files.iter().enumerate() {
            let ordinal = idx + 1;
            let png = std::fs::read(path).map_err(|e| RenderError::PageFailed {
                page: ordinal,
                detail: format!("reading {}: {e}", path.display()),
            })?;
            let (width, height) =
                encode::png_dimensions(&png).map_err(|e| RenderError::PageFailed {
                    page: ordinal,
                    detail: format!("pdftoppm wrote an unreadable PNG: {e}"),
                })?;
            if let Some(cb) = &self.progress {
                cb.on_page_rendered(ordinal, total, png.len());
            }
            pages.push(PageImage::new(ordinal, png, width, height));
        }

        if let Some(cb) = &self.progress {
            cb.on_render_complete(total);
        }
        Ok(pages)
    }
}

/// `poppler_path` may name the binary itself or the directory holding it.
pub fn pdftoppm_binary(poppler_path: Option<&Path>) -> PathBuf {
    let exe = format!("pdftoppm{}", std::env::consts::EXE_SUFFIX);
    match poppler_path {
        Some(p) if p.is_dir() => p.join(exe),
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(exe),
    }
}

impl PageRenderer for PopplerRenderer {
    fn name(&self) -> &'static str {
        POPPLER
    }

    fn render(&self, pdf: &[u8], dpi: u32) -> Result<Vec<PageImage>, RenderError> {
        if dpi == 0 {
            return Err(RenderError::InvalidDpi { dpi });
        }
        input::sniff_pdf(pdf)?;

        let workdir = tempfile::tempdir()
            .map_err(|e| RenderError::internal(format!("temporary directory: {e}")))?;
        let pdf_path = workdir.path().join("input.pdf");
        std::fs::write(&pdf_path, pdf)
            .map_err(|e| RenderError::internal(format!("temporary file write: {e}")))?;
        let prefix = workdir.path().join(OUTPUT_PREFIX);

        debug!("Running {} at {} DPI", self.binary.display(), dpi);
        let output = self
            .command(&pdf_path, &prefix, dpi)
            .output()
            .map_err(|e| spawn_error(&self.binary, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_exit(output.status.code(), stderr, self.password.is_some()));
        }

        let pages = self.load_pages(workdir.path())?;
        info!("pdftoppm rendered {} pages at {} DPI", pages.len(), dpi);
        Ok(pages)
    }
}

fn spawn_error(binary: &Path, e: std::io::Error) -> RenderError {
    let detail = format!("cannot run {}: {e}", binary.display());
    match e.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => RenderError::EngineUnavailable {
            engine: POPPLER.to_string(),
            detail,
        },
        _ => RenderError::EngineFailed {
            engine: POPPLER.to_string(),
            detail,
        },
    }
}

fn classify_exit(code: Option<i32>, stderr: String, had_password: bool) -> RenderError {
    let mentions_password = stderr.to_lowercase().contains("password");
    match code {
        Some(1) | Some(3) if mentions_password || code == Some(3) => {
            if had_password {
                RenderError::WrongPassword
            } else {
                RenderError::PasswordRequired
            }
        }
        Some(1) => RenderError::InvalidDocument {
            detail: if stderr.is_empty() {
                "pdftoppm could not open the document".to_string()
            } else {
                stderr
            },
        },
        other => RenderError::EngineFailed {
            engine: POPPLER.to_string(),
            detail: match other {
                Some(c) => format!("pdftoppm exited with status {c}: {stderr}"),
                None => format!("pdftoppm was terminated by a signal: {stderr}"),
            },
        },
    }
}

/// Page files in `dir`, ordered by their numeric suffix.
fn collect_pages(dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| RenderError::internal(format!("listing {}: {e}", dir.display())))?;

    let mut numbered: Vec<(usize, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name();
            page_number(name.to_str()?).map(|n| (n, entry.path()))
        })
        .collect();
    numbered.sort_by_key(|(n, _)| *n);

    for (expected, (n, _)) in numbered.iter().enumerate() {
        if *n != expected + 1 {
            return Err(RenderError::PageFailed {
                page: expected + 1,
                detail: format!("pdftoppm produced page {n} where page {} was expected", expected + 1),
            });
        }
    }
    Ok(numbered.into_iter().map(|(_, p)| p).collect())
}

/// `page-007.png` → `Some(7)`.
fn page_number(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix(OUTPUT_PREFIX)?
        .strip_prefix('-')?
        .strip_suffix(".png")?
        .parse()
        .ok()
}
