//! Packaging: ordered page images → one deflate-compressed ZIP.
//!
//! Entries are written in page order with fixed timestamps and permissions,
//! so packaging the same pages twice yields byte-identical archives.

use crate::error::RenderError;
use crate::output::{page_file_name, PageImage};
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Write every page as `page_NNN.png` (or `{prefix}_page_NNN.png`).
pub fn package(pages: &[PageImage], prefix: Option<&str>) -> Result<Vec<u8>, RenderError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for page in pages {
        let name = page_file_name(prefix, page.ordinal);
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| archive_error(&name, e))?;
        writer
            .write_all(&page.png)
            .map_err(|e| archive_error(&name, e))?;
    }
    let bytes = writer
        .finish()
        .map_err(|e| RenderError::Archive {
            detail: e.to_string(),
        })?
        .into_inner();

    debug!("Packaged {} pages → {} bytes zip", pages.len(), bytes.len());
    Ok(bytes)
}

fn archive_error(entry: &str, e: impl std::fmt::Display) -> RenderError {
    RenderError::Archive {
        detail: format!("{entry}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn pages(n: usize) -> Vec<PageImage> {
        (1..=n)
            .map(|i| PageImage::new(i, format!("png-bytes-of-page-{i}").into_bytes(), 8, 8))
            .collect()
    }

    fn entries(zip_bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(zip_bytes)).expect("valid zip");
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).expect("entry");
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).expect("read entry");
                (file.name().to_string(), buf)
            })
            .collect()
    }

    #[test]
    fn entries_follow_page_order_and_bytes() {
        let pages = pages(3);
        let zip_bytes = package(&pages, None).unwrap();
        let entries = entries(&zip_bytes);

        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["page_001.png", "page_002.png", "page_003.png"]);
        for ((_, data), page) in entries.iter().zip(&pages) {
            assert_eq!(data, &page.png);
        }
    }

    #[test]
    fn prefix_is_applied_to_every_entry() {
        let zip_bytes = package(&pages(2), Some("invoice")).unwrap();
        let names: Vec<String> = entries(&zip_bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["invoice_page_001.png", "invoice_page_002.png"]);
    }

    #[test]
    fn packaging_is_deterministic() {
        let pages = pages(4);
        assert_eq!(package(&pages, None).unwrap(), package(&pages, None).unwrap());
    }

    #[test]
    fn entries_are_deflated() {
        let pages = vec![PageImage::new(1, vec![0u8; 64 * 1024], 256, 256)];
        let zip_bytes = package(&pages, None).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(zip_bytes.as_slice())).unwrap();
        let file = archive.by_index(0).unwrap();
        assert_eq!(file.compression(), CompressionMethod::Deflated);
        assert!(file.compressed_size() < file.size());
    }
}
