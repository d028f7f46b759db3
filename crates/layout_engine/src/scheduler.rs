//! Background reflow scheduling
//!
//! Editing produces bursts of content changes. The scheduler turns them into
//! as few pagination runs as possible:
//! - Every request bumps a generation counter and waits out the debounce
//!   delay; a request that is no longer the newest when it wakes up is
//!   dropped without computing anything
//! - Pagination itself runs on the blocking pool against the immutable
//!   snapshot taken at request time
//! - A finished layout is published only if no newer request arrived in the
//!   meantime, so stale results are discarded rather than queued
//!
//! Published layouts are exposed through a `tokio::sync::watch` channel: a
//! single assignment that readers observe whole.

use crate::{
    CacheStats, ContainerSize, LayoutError, PageCacheKey, PageLayout, PaginationCache,
    PaginationEngine, Result,
};
use doc_model::{Document, Footnote};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Immutable snapshot to paginate
#[derive(Debug, Clone)]
pub struct PaginationRequest {
    pub document: Document,
    pub footnotes: Vec<Footnote>,
    pub container: ContainerSize,
}

impl PaginationRequest {
    pub fn new(document: Document, footnotes: Vec<Footnote>, container: ContainerSize) -> Self {
        Self {
            document,
            footnotes,
            container,
        }
    }
}

/// What happened to a scheduled request
#[derive(Debug, Clone)]
pub enum ReflowOutcome {
    /// The layout was computed (or found in the cache) and published
    Published(Arc<PageLayout>),
    /// A newer request arrived first; nothing was published
    Superseded,
}

impl ReflowOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, ReflowOutcome::Published(_))
    }
}

/// Debounced, last-writer-wins pagination runner
#[derive(Clone)]
pub struct PaginationScheduler {
    engine: Arc<PaginationEngine>,
    cache: Arc<Mutex<PaginationCache>>,
    generation: Arc<AtomicU64>,
    debounce: Duration,
    publisher: Arc<watch::Sender<Option<Arc<PageLayout>>>>,
}

impl PaginationScheduler {
    /// Create a scheduler using the engine's debounce and cache settings
    pub fn new(engine: PaginationEngine) -> Self {
        let debounce = Duration::from_millis(engine.settings().debounce_ms);
        let cache = PaginationCache::new(engine.settings().cache_capacity);
        let (publisher, _) = watch::channel(None);
        Self {
            engine: Arc::new(engine),
            cache: Arc::new(Mutex::new(cache)),
            generation: Arc::new(AtomicU64::new(0)),
            debounce,
            publisher: Arc::new(publisher),
        }
    }

    /// Override the debounce delay
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn engine(&self) -> &PaginationEngine {
        &self.engine
    }

    /// Receiver that is notified whenever a new layout is published
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PageLayout>>> {
        self.publisher.subscribe()
    }

    /// Most recently published layout
    pub fn latest(&self) -> Option<Arc<PageLayout>> {
        self.publisher.borrow().clone()
    }

    /// Generation of the newest request
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Schedule a reflow of `request` after the debounce delay.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&self, request: PaginationRequest) -> JoinHandle<Result<ReflowOutcome>> {
        let generation = self.next_generation();
        let scheduler = self.clone();
        tokio::spawn(async move {
            if !scheduler.debounce.is_zero() {
                tokio::time::sleep(scheduler.debounce).await;
            }
            if !scheduler.is_current(generation) {
                tracing::debug!(generation, "Reflow request superseded before it ran");
                return Ok(ReflowOutcome::Superseded);
            }
            scheduler.run(generation, request).await
        })
    }

    /// Paginate immediately, bypassing the debounce delay
    pub async fn compute_now(&self, request: PaginationRequest) -> Result<ReflowOutcome> {
        let generation = self.next_generation();
        self.run(generation, request).await
    }

    /// Drop all cached layouts
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn run(&self, generation: u64, request: PaginationRequest) -> Result<ReflowOutcome> {
        let layout = self.layout_for(request).await?;
        if self.publish(generation, Arc::clone(&layout)) {
            tracing::debug!(generation, pages = layout.page_count(), "Published page layout");
            Ok(ReflowOutcome::Published(layout))
        } else {
            tracing::debug!(generation, "Discarded stale page layout");
            Ok(ReflowOutcome::Superseded)
        }
    }

    async fn layout_for(&self, request: PaginationRequest) -> Result<Arc<PageLayout>> {
        let key = PageCacheKey::new(&request.document, &request.footnotes, request.container);
        if let Some(layout) = self.cache.lock().await.get(&key) {
            return Ok(layout);
        }

        let engine = Arc::clone(&self.engine);
        let layout = tokio::task::spawn_blocking(move || {
            engine.compute_pages(&request.document, &request.footnotes, request.container)
        })
        .await
        .map_err(|e| LayoutError::TaskFailed(e.to_string()))??;

        let layout = Arc::new(layout);
        self.cache.lock().await.insert(key, Arc::clone(&layout));
        Ok(layout)
    }

    /// Publish if `generation` is still the newest request
    fn publish(&self, generation: u64, layout: Arc<PageLayout>) -> bool {
        self.publisher.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = Some(layout);
            true
        })
    }
}
