//! Bounded render cache with single-flight rendering.
//!
//! Maps a [`RenderRequest`] (document identity + DPI) to the finished
//! [`RenderedDocument`]. Capacity is fixed at construction; when an insert
//! overflows it the oldest-inserted entry is dropped. Lookups use `peek`, so
//! reading an entry never changes its eviction order.
//!
//! # Thread Safety
//!
//! The cache is shared as `Arc<RenderCache>`. The entry map sits behind a
//! `tokio::sync::Mutex` that is only held for lookups and inserts, never
//! across a render. Concurrent calls for the same request queue on a
//! per-request gate: the first caller renders, the rest re-check the map
//! when it finishes and find the stored result. Failures are not stored, so
//! if the first render fails the next waiter renders again.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::RasterConfig;
use crate::document::{RenderRequest, SourceDocument};
use crate::error::RenderError;
use crate::output::RenderedDocument;
use crate::pipeline::render::{renderer_for, PageRenderer};

/// What the cache hands back: the shared document or the reason it failed.
pub type RenderResult = Result<Arc<RenderedDocument>, RenderError>;

type Gate = Arc<Mutex<()>>;

/// Counter snapshot returned by [`RenderCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests answered from memory.
    pub hits: u64,
    /// Requests that had to render.
    pub misses: u64,
    /// Renderer invocations, including forced re-renders.
    pub renders: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
    /// Renders that ended in a [`RenderError`].
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    renders: AtomicU64,
    evictions: AtomicU64,
    failures: AtomicU64,
}

/// Memoises renders of `(document, dpi)` pairs.
pub struct RenderCache {
    renderer: Arc<dyn PageRenderer>,
    entries: Mutex<LruCache<RenderRequest, Arc<RenderedDocument>>>,
    inflight: Mutex<HashMap<RenderRequest, Gate>>,
    capacity: NonZeroUsize,
    counters: Counters,
}

impl RenderCache {
    /// A cache in front of `renderer` holding at most `capacity` documents.
    /// A capacity of zero is treated as one.
    pub fn new(renderer: Arc<dyn PageRenderer>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            renderer,
            entries: Mutex::new(LruCache::new(capacity)),
            inflight: Mutex::new(HashMap::new()),
            capacity,
            counters: Counters::default(),
        }
    }

    /// Backend and capacity taken from `config`.
    pub fn from_config(config: &RasterConfig) -> Self {
        Self::new(renderer_for(config), config.cache_capacity)
    }

    /// Name of the engine behind this cache.
    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Return the cached render for `request`, rendering `bytes` on a miss.
    ///
    /// A hit never touches the renderer and never rebuilds the archive.
    /// A failure leaves no entry behind for `request`.
    pub async fn get_or_render(&self, request: &RenderRequest, bytes: Arc<[u8]>) -> RenderResult {
        if let Some(hit) = self.lookup(request).await {
            return Ok(hit);
        }

        let gate = self.gate(request).await;
        let result = {
            let _turn = gate.lock().await;
            match self.lookup(request).await {
                Some(hit) => Ok(hit),
                None => {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    self.render_and_store(request, bytes).await
                }
            }
        };
        self.release(request, gate).await;
        result
    }

    /// [`Self::get_or_render`] for a loaded document.
    pub async fn render(&self, document: &SourceDocument, dpi: u32) -> RenderResult {
        self.get_or_render(&document.request(dpi), Arc::clone(document.bytes()))
            .await
    }

    /// Render again even if an entry exists.
    ///
    /// Success replaces the entry; failure removes it, so a broken render
    /// never leaves an older result looking current.
    pub async fn rerender(&self, request: &RenderRequest, bytes: Arc<[u8]>) -> RenderResult {
        let gate = self.gate(request).await;
        let result = {
            let _turn = gate.lock().await;
            self.render_and_store(request, bytes).await
        };
        self.release(request, gate).await;
        result
    }

    /// Cached render for `request`, without rendering or touching counters.
    pub async fn get(&self, request: &RenderRequest) -> Option<Arc<RenderedDocument>> {
        self.entries.lock().await.peek(request).cloned()
    }

    pub async fn contains(&self, request: &RenderRequest) -> bool {
        self.entries.lock().await.contains(request)
    }

    /// Drop the entry for `request`. Returns whether one existed.
    pub async fn invalidate(&self, request: &RenderRequest) -> bool {
        self.entries.lock().await.pop(request).is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Cached requests, oldest first.
    pub async fn requests(&self) -> Vec<RenderRequest> {
        // LruCache iterates most-recent first; inserts are the only recency bumps.
        let entries = self.entries.lock().await;
        let mut keys: Vec<RenderRequest> = entries.iter().map(|(k, _)| k.clone()).collect();
        keys.reverse();
        keys
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            renders: self.counters.renders.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    async fn lookup(&self, request: &RenderRequest) -> Option<Arc<RenderedDocument>> {
        let hit = self.entries.lock().await.peek(request).cloned();
        if hit.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit for {}", request);
        }
        hit
    }

    async fn render_and_store(&self, request: &RenderRequest, bytes: Arc<[u8]>) -> RenderResult {
        self.counters.renders.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let renderer = Arc::clone(&self.renderer);
        let owned_request = request.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let pages = renderer.render(&bytes, owned_request.dpi)?;
            RenderedDocument::assemble(owned_request, pages)
        })
        .await
        .map_err(|e| RenderError::internal(format!("Render task panicked: {e}")))
        .and_then(|r| r);

        match outcome {
            Ok(document) => {
                info!(
                    "Rendered {} with {}: {} pages, {} byte archive in {}ms",
                    request,
                    self.renderer.name(),
                    document.page_count(),
                    document.archive().len(),
                    start.elapsed().as_millis()
                );
                let document = Arc::new(document);
                self.store(request, Arc::clone(&document)).await;
                Ok(document)
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                if self.entries.lock().await.pop(request).is_some() {
                    debug!("Dropped stale entry for {} after failed render", request);
                }
                warn!("Render of {} failed: {}", request, e);
                Err(e)
            }
        }
    }

    async fn store(&self, request: &RenderRequest, document: Arc<RenderedDocument>) {
        let displaced = self.entries.lock().await.push(request.clone(), document);
        if let Some((old, _)) = displaced {
            if &old != request {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("Evicted {} (capacity {})", old, self.capacity);
            }
        }
    }

    async fn gate(&self, request: &RenderRequest) -> Gate {
        let mut inflight = self.inflight.lock().await;
        Arc::clone(inflight.entry(request.clone()).or_default())
    }

    /// Forget the gate once no other caller holds it.
    async fn release(&self, request: &RenderRequest, gate: Gate) {
        let mut inflight = self.inflight.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&gate) <= 2 {
            inflight.remove(request);
        }
    }

    #[cfg(test)]
    async fn inflight_len(&self) -> usize {
        self.inflight.lock().await.len()
    }
}
