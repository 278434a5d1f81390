//! Render cache behaviour against scripted renderers.
//!
//! No PDF engine is needed: each test plugs a [`PageRenderer`] that fabricates
//! real PNG pages, so archive contents, cache keys, eviction and
//! single-flight can be checked exactly.

use edgequake_pdf2png::pipeline::{encode, input};
use edgequake_pdf2png::{
    PageImage, PageRenderer, RasterConfig, RenderCache, RenderError, SourceDocument,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Renders `pages` solid-colour PNGs sized from the DPI, counting calls.
struct ScriptedRenderer {
    pages: usize,
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Duration,
}

impl ScriptedRenderer {
    fn new(pages: usize) -> Arc<Self> {
        Self::with_delay(pages, Duration::ZERO)
    }

    fn with_delay(pages: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            pages,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PageRenderer for ScriptedRenderer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn render(&self, pdf: &[u8], dpi: u32) -> Result<Vec<PageImage>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        input::sniff_pdf(pdf)?;
        if self.fail.load(Ordering::SeqCst) {
            return Err(RenderError::EngineFailed {
                engine: "scripted".into(),
                detail: "told to fail".into(),
            });
        }
        (1..=self.pages)
            .map(|ordinal| {
                let side = dpi / 30;
                let shade = (ordinal * 60 % 256) as u8;
                let img = RgbImage::from_pixel(side, side, Rgb([shade, 0, 255 - shade]));
                let png = encode::encode_png(&DynamicImage::ImageRgb8(img)).map_err(|e| {
                    RenderError::PageFailed {
                        page: ordinal,
                        detail: e.to_string(),
                    }
                })?;
                Ok(PageImage::new(ordinal, png, side, side))
            })
            .collect()
    }
}

/// Returns pages 1, 2, 4.
struct GappyRenderer;

impl PageRenderer for GappyRenderer {
    fn name(&self) -> &'static str {
        "gappy"
    }

    fn render(&self, _pdf: &[u8], _dpi: u32) -> Result<Vec<PageImage>, RenderError> {
        Ok([1, 2, 4]
            .into_iter()
            .map(|n| PageImage::new(n, vec![n as u8], 1, 1))
            .collect())
    }
}

fn pdf(tag: &str) -> SourceDocument {
    SourceDocument::new(
        format!("%PDF-1.4\n% {tag}\n%%EOF\n").into_bytes(),
        Some(format!("{tag}.pdf")),
    )
}

fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            (entry.name().to_string(), data)
        })
        .collect()
}

// ── Rendering contract ───────────────────────────────────────────────────────

#[tokio::test]
async fn three_page_document_at_300_dpi() {
    let renderer = ScriptedRenderer::new(3);
    let cache = RenderCache::new(renderer.clone(), 5);
    let doc = pdf("three");

    let rendered = cache.render(&doc, 300).await.unwrap();
    assert_eq!(rendered.page_count(), 3);
    let ordinals: Vec<usize> = rendered.pages().iter().map(|p| p.ordinal).collect();
    assert_eq!(ordinals, [1, 2, 3]);

    let entries = zip_entries(rendered.archive());
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["page_001.png", "page_002.png", "page_003.png"]);

    for (ordinal, (_, data)) in (1..=3).zip(&entries) {
        let page = rendered.page(ordinal).expect("page by ordinal");
        assert_eq!(&page.png, data, "archive entry {ordinal} differs from page bytes");
        assert_eq!(page.file_name(Some(doc.base_name())), format!("three_page_{ordinal:03}.png"));
    }
    assert!(rendered.page(4).is_none());
}

#[tokio::test]
async fn named_archive_uses_document_prefix() {
    let cache = RenderCache::new(ScriptedRenderer::new(2), 5);
    let rendered = cache.render(&pdf("doc"), 150).await.unwrap();

    let named = rendered.archive_with_prefix("doc").unwrap();
    let names: Vec<String> = zip_entries(&named).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["doc_page_001.png", "doc_page_002.png"]);
}

// ── Cache hits and keys ──────────────────────────────────────────────────────

#[tokio::test]
async fn identical_request_renders_once() {
    let renderer = ScriptedRenderer::new(2);
    let cache = RenderCache::new(renderer.clone(), 5);
    let doc = pdf("twice");

    let first = cache.render(&doc, 300).await.unwrap();
    let second = cache.render(&doc, 300).await.unwrap();

    assert_eq!(renderer.calls(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn same_bytes_under_another_name_hit_the_cache() {
    let renderer = ScriptedRenderer::new(1);
    let cache = RenderCache::new(renderer.clone(), 5);
    let bytes = b"%PDF-1.7\n%%EOF\n".to_vec();

    let a = SourceDocument::new(bytes.clone(), Some("a.pdf".into()));
    let b = SourceDocument::new(bytes, Some("b.pdf".into()));
    cache.render(&a, 300).await.unwrap();
    cache.render(&b, 300).await.unwrap();
    assert_eq!(renderer.calls(), 1);
}

#[tokio::test]
async fn changing_dpi_is_a_miss() {
    let renderer = ScriptedRenderer::new(1);
    let cache = RenderCache::new(renderer.clone(), 5);
    let doc = pdf("dpi");

    let at_300 = cache.render(&doc, 300).await.unwrap();
    let at_150 = cache.render(&doc, 150).await.unwrap();

    assert_eq!(renderer.calls(), 2);
    assert_eq!(at_300.dpi(), 300);
    assert_eq!(at_150.dpi(), 150);
    assert_ne!(at_300.pages()[0].width, at_150.pages()[0].width);
    assert_eq!(cache.len().await, 2);
}

#[tokio::test]
async fn packaging_is_deterministic() {
    let doc = pdf("stable");
    let one = RenderCache::new(ScriptedRenderer::new(3), 5);
    let two = RenderCache::new(ScriptedRenderer::new(3), 5);

    let a = one.render(&doc, 300).await.unwrap();
    let b = two.render(&doc, 300).await.unwrap();
    assert_eq!(a.archive(), b.archive());
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_input_is_reported_and_not_cached() {
    // The real default engine; the signature check runs before it is loaded.
    let cache = RenderCache::from_config(&RasterConfig::default());

    for bytes in [Vec::new(), b"<html>not a pdf</html>".to_vec()] {
        let doc = SourceDocument::new(bytes, Some("bad.pdf".into()));
        let err = cache.render(&doc, 300).await.unwrap_err();
        assert!(matches!(err, RenderError::InvalidDocument { .. }), "got {err:?}");
        assert!(!err.to_string().trim().is_empty());
        assert!(!cache.contains(&doc.request(300)).await);
    }
    assert!(cache.is_empty().await);
    assert_eq!(cache.stats().failures, 2);
}

#[tokio::test]
async fn failures_are_retried_on_the_next_call() {
    let renderer = ScriptedRenderer::new(1);
    let cache = RenderCache::new(renderer.clone(), 5);
    let doc = pdf("flaky");

    renderer.fail.store(true, Ordering::SeqCst);
    assert!(cache.render(&doc, 300).await.is_err());

    renderer.fail.store(false, Ordering::SeqCst);
    assert!(cache.render(&doc, 300).await.is_ok());
    assert_eq!(renderer.calls(), 2);
}

#[tokio::test]
async fn failed_rerender_drops_the_previous_success() {
    let renderer = ScriptedRenderer::new(2);
    let cache = RenderCache::new(renderer.clone(), 5);
    let doc = pdf("stale");
    let request = doc.request(300);

    cache.render(&doc, 300).await.unwrap();
    assert!(cache.contains(&request).await);

    renderer.fail.store(true, Ordering::SeqCst);
    let err = cache.rerender(&request, doc.bytes().clone()).await.unwrap_err();
    assert!(err.is_environmental());
    assert!(!cache.contains(&request).await);
}

#[tokio::test]
async fn non_contiguous_pages_are_an_internal_error() {
    let cache = RenderCache::new(Arc::new(GappyRenderer), 5);
    let doc = pdf("gappy");

    let err = cache.render(&doc, 300).await.unwrap_err();
    assert!(matches!(err, RenderError::Internal { .. }), "got {err:?}");
    assert!(cache.is_empty().await);
}

// ── Capacity ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sixth_insert_evicts_the_first() {
    let cache = RenderCache::new(ScriptedRenderer::new(1), 5);
    let docs: Vec<SourceDocument> = (1..=6).map(|i| pdf(&format!("doc{i}"))).collect();

    for doc in &docs {
        cache.render(doc, 300).await.unwrap();
    }

    assert_eq!(cache.len().await, 5);
    assert!(!cache.contains(&docs[0].request(300)).await);
    for doc in &docs[1..] {
        assert!(cache.contains(&doc.request(300)).await);
    }
    let expected: Vec<_> = docs[1..].iter().map(|d| d.request(300)).collect();
    assert_eq!(cache.requests().await, expected);
    assert_eq!(cache.stats().evictions, 1);
}

#[tokio::test]
async fn hits_do_not_refresh_eviction_order() {
    let cache = RenderCache::new(ScriptedRenderer::new(1), 2);
    let (a, b, c) = (pdf("a"), pdf("b"), pdf("c"));

    cache.render(&a, 300).await.unwrap();
    cache.render(&b, 300).await.unwrap();
    cache.render(&a, 300).await.unwrap();
    cache.render(&c, 300).await.unwrap();

    assert!(!cache.contains(&a.request(300)).await);
    assert!(cache.contains(&b.request(300)).await);
    assert!(cache.contains(&c.request(300)).await);
}

#[tokio::test]
async fn clear_empties_but_keeps_counters() {
    let cache = RenderCache::new(ScriptedRenderer::new(1), 5);
    cache.render(&pdf("x"), 300).await.unwrap();
    cache.clear().await;
    assert!(cache.is_empty().await);
    assert_eq!(cache.stats().renders, 1);
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_requests_share_one_render() {
    let renderer = ScriptedRenderer::with_delay(2, Duration::from_millis(100));
    let cache = Arc::new(RenderCache::new(renderer.clone(), 5));
    let doc = pdf("busy");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let doc = doc.clone();
            tokio::spawn(async move { cache.render(&doc, 300).await })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    let first = results[0].as_ref().unwrap().as_ref().unwrap().clone();
    for result in &results {
        let rendered = result.as_ref().unwrap().as_ref().unwrap();
        assert!(Arc::ptr_eq(rendered, &first));
    }
    assert_eq!(renderer.calls(), 1);
    assert_eq!(cache.stats().renders, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_requests_render_independently() {
    let renderer = ScriptedRenderer::with_delay(1, Duration::from_millis(20));
    let cache = Arc::new(RenderCache::new(renderer.clone(), 5));
    let doc = pdf("split");

    let (a, b) = tokio::join!(cache.render(&doc, 150), cache.render(&doc, 600));
    assert_eq!(a.unwrap().dpi(), 150);
    assert_eq!(b.unwrap().dpi(), 600);
    assert_eq!(renderer.calls(), 2);
}
