//! Viewer state: which document is open, at what resolution, and which page
//! is showing.
//!
//! [`Viewer`] is a plain state object with no rendering of its own; it asks a
//! [`RenderCache`] for the pages. Changing the document or the DPI always
//! returns the viewer to page 1 and drops the held result, so a page ordinal
//! from one render is never applied to another.

use crate::cache::{RenderCache, RenderResult};
use crate::document::{RenderRequest, SourceDocument};
use crate::error::RenderError;
use crate::output::{PageImage, RenderedDocument};
use std::sync::Arc;
use tracing::debug;

/// Interactive pagination over a rendered document.
#[derive(Debug)]
pub struct Viewer {
    document: Option<SourceDocument>,
    dpi: u32,
    result: Option<Arc<RenderedDocument>>,
    last_error: Option<RenderError>,
    page: usize,
}

impl Viewer {
    pub fn new(dpi: u32) -> Self {
        Self {
            document: None,
            dpi,
            result: None,
            last_error: None,
            page: 1,
        }
    }

    /// Show `document`. Reopening the same content keeps the current page.
    pub fn open(&mut self, document: SourceDocument) {
        let changed = self
            .document
            .as_ref()
            .is_none_or(|current| current.id() != document.id());
        self.document = Some(document);
        if changed {
            self.reset();
        }
    }

    /// Switch resolution. Returns whether anything changed.
    pub fn set_dpi(&mut self, dpi: u32) -> bool {
        if dpi == self.dpi {
            return false;
        }
        self.dpi = dpi;
        self.reset();
        true
    }

    /// Forget the document and everything derived from it.
    pub fn close(&mut self) {
        self.document = None;
        self.reset();
    }

    /// Cache key for what the viewer should be showing.
    pub fn request(&self) -> Option<RenderRequest> {
        self.document.as_ref().map(|d| d.request(self.dpi))
    }

    /// Bring the held result in line with the current document and DPI.
    ///
    /// Returns `None` when no document is open. An up-to-date result is
    /// returned without consulting the cache. On failure the held result is
    /// dropped and the error is kept for [`Self::last_error`].
    pub async fn refresh(&mut self, cache: &RenderCache) -> Option<RenderResult> {
        let document = self.document.as_ref()?;
        let request = document.request(self.dpi);

        if let Some(current) = &self.result {
            if current.request() == &request {
                return Some(Ok(Arc::clone(current)));
            }
        }

        let outcome = cache.render(document, self.dpi).await;
        match &outcome {
            Ok(rendered) => {
                self.page = self.page.clamp(1, rendered.page_count());
                self.result = Some(Arc::clone(rendered));
                self.last_error = None;
                debug!("Viewer showing {} ({} pages)", request, rendered.page_count());
            }
            Err(e) => {
                self.result = None;
                self.last_error = Some(e.clone());
                self.page = 1;
            }
        }
        Some(outcome)
    }

    /// Advance one page. Refused on the last page.
    pub fn next(&mut self) -> bool {
        self.go_to(self.page + 1)
    }

    /// Go back one page. Refused on page 1.
    pub fn previous(&mut self) -> bool {
        self.page > 1 && self.go_to(self.page - 1)
    }

    /// Jump to page `ordinal`. Refused outside `1..=page_count()`.
    pub fn go_to(&mut self, ordinal: usize) -> bool {
        if (1..=self.page_count()).contains(&ordinal) {
            self.page = ordinal;
            true
        } else {
            false
        }
    }

    pub fn current_page(&self) -> Option<&PageImage> {
        self.result.as_ref()?.page(self.page)
    }

    /// Page count of the held result, zero without one.
    pub fn page_count(&self) -> usize {
        self.result.as_ref().map_or(0, |r| r.page_count())
    }

    pub fn page_ordinal(&self) -> usize {
        self.page
    }

    pub fn result(&self) -> Option<&Arc<RenderedDocument>> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&RenderError> {
        self.last_error.as_ref()
    }

    pub fn document(&self) -> Option<&SourceDocument> {
        self.document.as_ref()
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    fn reset(&mut self) {
        self.page = 1;
        self.result = None;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::PageRenderer;

    /// Page count taken from the byte after the `%PDF-` marker.
    struct FixedPages;

    impl PageRenderer for FixedPages {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn render(&self, pdf: &[u8], _dpi: u32) -> Result<Vec<PageImage>, RenderError> {
            match pdf.get(5).copied() {
                Some(n @ b'1'..=b'9') => Ok((1..=(n - b'0') as usize)
                    .map(|i| PageImage::new(i, vec![i as u8], 1, 1))
                    .collect()),
                _ => Err(RenderError::invalid_document("unreadable")),
            }
        }
    }

    fn cache() -> RenderCache {
        RenderCache::new(Arc::new(FixedPages), 5)
    }

    fn doc(marker: &[u8]) -> SourceDocument {
        SourceDocument::new(marker.to_vec(), Some("sample.pdf".into()))
    }

    #[tokio::test]
    async fn navigation_is_bounded() {
        let cache = cache();
        let mut viewer = Viewer::new(300);
        viewer.open(doc(b"%PDF-3"));
        viewer.refresh(&cache).await.unwrap().unwrap();

        assert_eq!(viewer.page_count(), 3);
        assert!(!viewer.previous());
        assert!(viewer.next());
        assert!(viewer.next());
        assert!(!viewer.next());
        assert_eq!(viewer.page_ordinal(), 3);
        assert!(!viewer.go_to(0));
        assert!(!viewer.go_to(4));
        assert!(viewer.go_to(1));
        assert_eq!(viewer.current_page().unwrap().ordinal, 1);
    }

    #[tokio::test]
    async fn dpi_change_resets_to_first_page() {
        let cache = cache();
        let mut viewer = Viewer::new(300);
        viewer.open(doc(b"%PDF-4"));
        viewer.refresh(&cache).await.unwrap().unwrap();
        viewer.go_to(3);

        assert!(viewer.set_dpi(150));
        assert_eq!(viewer.page_ordinal(), 1);
        assert!(viewer.result().is_none());

        let rendered = viewer.refresh(&cache).await.unwrap().unwrap();
        assert_eq!(rendered.dpi(), 150);
        assert!(!viewer.set_dpi(150));
    }

    #[tokio::test]
    async fn new_document_resets_but_same_content_does_not() {
        let cache = cache();
        let mut viewer = Viewer::new(300);
        viewer.open(doc(b"%PDF-5"));
        viewer.refresh(&cache).await.unwrap().unwrap();
        viewer.go_to(4);

        viewer.open(doc(b"%PDF-5"));
        assert_eq!(viewer.page_ordinal(), 4);

        viewer.open(doc(b"%PDF-2"));
        assert_eq!(viewer.page_ordinal(), 1);
        assert_eq!(viewer.page_count(), 0);
    }

    #[tokio::test]
    async fn failure_clears_result_and_records_error() {
        let cache = cache();
        let mut viewer = Viewer::new(300);
        viewer.open(doc(b"%PDF-2"));
        viewer.refresh(&cache).await.unwrap().unwrap();
        assert!(viewer.result().is_some());

        viewer.open(doc(b"%PDF-x"));
        let outcome = viewer.refresh(&cache).await.unwrap();
        assert!(outcome.is_err());
        assert!(viewer.result().is_none());
        assert!(viewer.current_page().is_none());
        assert!(matches!(
            viewer.last_error(),
            Some(RenderError::InvalidDocument { .. })
        ));
    }

    #[tokio::test]
    async fn refresh_without_document_is_none() {
        let mut viewer = Viewer::new(300);
        assert!(viewer.refresh(&cache()).await.is_none());

        viewer.open(doc(b"%PDF-1"));
        viewer.close();
        assert!(viewer.document().is_none());
        assert!(viewer.request().is_none());
    }

    #[tokio::test]
    async fn up_to_date_result_skips_the_cache() {
        let cache = cache();
        let mut viewer = Viewer::new(300);
        viewer.open(doc(b"%PDF-2"));
        viewer.refresh(&cache).await.unwrap().unwrap();
        viewer.refresh(&cache).await.unwrap().unwrap();
        assert_eq!(cache.stats().renders, 1);
        assert_eq!(cache.stats().hits, 0);
    }
}
