//! Locating and binding the pdfium shared library.
//!
//! `pdfium-render` needs a real `libpdfium` at runtime. Binding is attempted
//! in a fixed order and every failure is collected, so the single
//! [`RenderError::EngineUnavailable`] a caller sees lists every place that
//! was tried.
//!
//! 1. The explicit path from [`crate::config::RasterConfig::pdfium_library_path`]
//!    (a library file, or a directory containing the platform library)
//! 2. `PDFIUM_LIB_PATH`
//! 3. The platform library name in the current working directory
//! 4. The system library search path

use crate::error::RenderError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

pub(crate) const PDFIUM: &str = "pdfium";

/// Bind to pdfium, or explain why it could not be found.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, RenderError> {
    let mut attempts: Vec<String> = Vec::new();

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = explicit {
        candidates.push(library_file(path));
    }
    if let Some(env_path) = std::env::var_os("PDFIUM_LIB_PATH").filter(|v| !v.is_empty()) {
        candidates.push(library_file(Path::new(&env_path)));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    for candidate in candidates {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => attempts.push(format!("{}: {}", candidate.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound pdfium from the system library path");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            attempts.push(format!("system library: {e}"));
            Err(RenderError::EngineUnavailable {
                engine: PDFIUM.to_string(),
                detail: format!("could not load libpdfium ({})", attempts.join("; ")),
            })
        }
    }
}

/// A directory means "the platform library inside it".
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_resolves_to_platform_library() {
        let dir = tempfile::tempdir().unwrap();
        let file = library_file(dir.path());
        assert_eq!(file.parent(), Some(dir.path()));
        assert!(file
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains("pdfium"));
    }

    #[test]
    fn file_path_is_kept() {
        let p = Path::new("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(library_file(p), p);
    }

    #[test]
    fn missing_library_names_every_attempt() {
        // Only meaningful where no pdfium is installed; skip otherwise.
        if std::env::var("E2E_ENABLED").is_ok() {
            return;
        }
        let bogus = Path::new("/nonexistent/libpdfium-test.so");
        if let Err(err) = bind_pdfium(Some(bogus)) {
            assert!(err.is_environmental());
            assert!(err.to_string().contains("/nonexistent/libpdfium-test.so"));
        }
    }
}
