//! Render output types.

use crate::document::RenderRequest;
use crate::error::RenderError;
use crate::pipeline::archive;
use serde::Serialize;

/// One rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based page number, matching the source document order.
    pub ordinal: usize,
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PageImage {
    pub fn new(ordinal: usize, png: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            ordinal,
            png,
            width,
            height,
        }
    }

    /// Download name: `{base}_page_007.png`, or `page_007.png` without a base.
    pub fn file_name(&self, base: Option<&str>) -> String {
        page_file_name(base, self.ordinal)
    }
}

/// File name of page `ordinal` with three-digit zero padding.
pub fn page_file_name(base: Option<&str>, ordinal: usize) -> String {
    match base {
        Some(base) => format!("{base}_page_{ordinal:03}.png"),
        None => format!("page_{ordinal:03}.png"),
    }
}

/// Name of the whole-document archive: `{base}_all_pages.zip`.
pub fn archive_file_name(base: &str) -> String {
    format!("{base}_all_pages.zip")
}

/// A complete, successful render: every page plus the packaged archive.
///
/// Only ever constructed whole; a failed render is a [`RenderError`] instead.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    request: RenderRequest,
    pages: Vec<PageImage>,
    archive: Vec<u8>,
}

impl RenderedDocument {
    /// Check the ordinal contract and package the archive.
    ///
    /// # Errors
    /// [`RenderError::Internal`] if the pages are not numbered `1..=N` in
    /// order, [`RenderError::InvalidDocument`] if there are no pages, and
    /// [`RenderError::Archive`] if packaging fails.
    pub fn assemble(request: RenderRequest, pages: Vec<PageImage>) -> Result<Self, RenderError> {
        if pages.is_empty() {
            return Err(RenderError::invalid_document("document has no pages"));
        }
        if let Some((i, page)) = pages
            .iter()
            .enumerate()
            .find(|(i, page)| page.ordinal != i + 1)
        {
            return Err(RenderError::internal(format!(
                "renderer returned page ordinal {} at position {}",
                page.ordinal,
                i + 1
            )));
        }
        let archive = archive::package(&pages, None)?;
        Ok(Self {
            request,
            pages,
            archive,
        })
    }

    pub fn request(&self) -> &RenderRequest {
        &self.request
    }

    pub fn dpi(&self) -> u32 {
        self.request.dpi
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[PageImage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page by 1-based ordinal.
    pub fn page(&self, ordinal: usize) -> Option<&PageImage> {
        ordinal.checked_sub(1).and_then(|i| self.pages.get(i))
    }

    /// ZIP with `page_NNN.png` entries, built once when the render completed.
    pub fn archive(&self) -> &[u8] {
        &self.archive
    }

    /// A fresh archive whose entries carry the document name:
    /// `{base}_page_NNN.png`.
    pub fn archive_with_prefix(&self, base: &str) -> Result<Vec<u8>, RenderError> {
        archive::package(&self.pages, Some(base))
    }

    /// Serializable overview (no pixel data).
    pub fn summary(&self, base: Option<&str>) -> RenderSummary {
        RenderSummary {
            document_id: self.request.document_id.to_string(),
            dpi: self.request.dpi,
            page_count: self.pages.len(),
            archive_bytes: self.archive.len(),
            pages: self
                .pages
                .iter()
                .map(|p| PageSummary {
                    ordinal: p.ordinal,
                    file_name: p.file_name(base),
                    width: p.width,
                    height: p.height,
                    png_bytes: p.png.len(),
                })
                .collect(),
        }
    }
}

/// JSON-friendly description of a [`RenderedDocument`].
#[derive(Debug, Clone, Serialize)]
pub struct RenderSummary {
    pub document_id: String,
    pub dpi: u32,
    pub page_count: usize,
    pub archive_bytes: usize,
    pub pages: Vec<PageSummary>,
}

/// One entry of [`RenderSummary::pages`].
#[derive(Debug, Clone, Serialize)]
pub struct PageSummary {
    pub ordinal: usize,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub png_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceDocument;

    fn pages(n: usize) -> Vec<PageImage> {
        (1..=n)
            .map(|i| PageImage::new(i, vec![i as u8; 16], 10, 20))
            .collect()
    }

    fn request() -> RenderRequest {
        SourceDocument::new(b"%PDF-1.4".to_vec(), None).request(300)
    }

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(page_file_name(None, 1), "page_001.png");
        assert_eq!(page_file_name(Some("scan"), 42), "scan_page_042.png");
        assert_eq!(page_file_name(None, 1234), "page_1234.png");
        assert_eq!(archive_file_name("scan"), "scan_all_pages.zip");
    }

    #[test]
    fn assemble_rejects_gaps_and_empty() {
        let mut gappy = pages(3);
        gappy[2].ordinal = 4;
        let err = RenderedDocument::assemble(request(), gappy).unwrap_err();
        assert!(matches!(err, RenderError::Internal { .. }), "got {err:?}");

        let err = RenderedDocument::assemble(request(), Vec::new()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidDocument { .. }), "got {err:?}");
    }

    #[test]
    fn pages_are_addressable_by_ordinal() {
        let doc = RenderedDocument::assemble(request(), pages(3)).unwrap();
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.page(1).unwrap().png, vec![1u8; 16]);
        assert_eq!(doc.page(3).unwrap().ordinal, 3);
        assert!(doc.page(0).is_none());
        assert!(doc.page(4).is_none());
        assert!(!doc.archive().is_empty());
    }

    #[test]
    fn summary_lists_every_page() {
        let doc = RenderedDocument::assemble(request(), pages(2)).unwrap();
        let summary = doc.summary(Some("report"));
        assert_eq!(summary.page_count, 2);
        assert_eq!(summary.pages[1].file_name, "report_page_002.png");
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"dpi\":300"));
    }
}
