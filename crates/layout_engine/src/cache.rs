//! Pagination result cache
//!
//! Pages are a pure function of the document content, the footnote set and
//! the container size, so a finished [`PageLayout`] can be reused whenever
//! all three are unchanged. Typical hits are undo/redo back to a known state,
//! toggling between two window sizes, and repeated requests from a burst of
//! non-content events.
//!
//! # Features
//!
//! - **LRU eviction policy**: least-recently-used layouts are evicted once
//!   the cache holds `capacity` entries
//! - **Content-based cache keys**: content hash + footnote hash + container
//!   size, with sizes stored as fixed-point so they can be hashed
//! - **Statistics tracking**: hit/miss/eviction counters

use crate::{ContainerSize, PageLayout};
use doc_model::{Document, Footnote};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Cache key for one pagination request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageCacheKey {
    /// Hash of the document text and attachments
    pub content_hash: u64,
    /// Hash of the footnotes that affect layout
    pub footnote_hash: u64,
    /// Container width in hundredths of a point
    pub width_fixed: u32,
    /// Container height in hundredths of a point
    pub height_fixed: u32,
}

impl PageCacheKey {
    pub fn new(document: &Document, footnotes: &[Footnote], container: ContainerSize) -> Self {
        Self {
            content_hash: document.content_hash(),
            footnote_hash: hash_footnotes(footnotes),
            width_fixed: (container.width * 100.0) as u32,
            height_fixed: (container.height * 100.0) as u32,
        }
    }

    /// Container size this key was built for
    pub fn container(&self) -> ContainerSize {
        ContainerSize::new(self.width_fixed as f32 / 100.0, self.height_fixed as f32 / 100.0)
    }
}

/// Hash the footnotes that take part in pagination.
///
/// Trashed footnotes do not affect layout and are left out, so trashing and
/// restoring a footnote returns to the same key.
pub fn hash_footnotes(footnotes: &[Footnote]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for note in footnotes.iter().filter(|f| f.is_active()) {
        note.id.hash(&mut hasher);
        note.character_position.hash(&mut hasher);
        note.number.hash(&mut hasher);
        note.content.hash(&mut hasher);
    }
    hasher.finish()
}

/// Cache statistics for monitoring performance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Number of evictions due to the capacity limit
    pub evictions: u64,
}

impl CacheStats {
    /// Get the hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

/// LRU cache of finished page layouts
#[derive(Debug)]
pub struct PaginationCache {
    entries: HashMap<PageCacheKey, Arc<PageLayout>>,
    /// LRU order (front = most recently used)
    lru: VecDeque<PageCacheKey>,
    capacity: usize,
    stats: CacheStats,
}

impl PaginationCache {
    /// Create a cache holding at most `capacity` layouts. A capacity of zero
    /// disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: VecDeque::new(),
            capacity,
            stats: CacheStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Look up a layout, counting the hit or miss
    pub fn get(&mut self, key: &PageCacheKey) -> Option<Arc<PageLayout>> {
        match self.entries.get(key) {
            Some(layout) => {
                let layout = Arc::clone(layout);
                self.stats.hits += 1;
                self.touch(*key);
                tracing::trace!(content_hash = key.content_hash, "Pagination cache hit");
                Some(layout)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Whether a layout is cached, without touching statistics or LRU order
    pub fn contains(&self, key: &PageCacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Store a layout, evicting the least recently used entries if needed
    pub fn insert(&mut self, key: PageCacheKey, layout: Arc<PageLayout>) {
        if self.capacity == 0 {
            return;
        }
        self.entries.insert(key, layout);
        self.touch(key);
        self.enforce_limit();
    }

    /// Drop every cached layout
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    fn touch(&mut self, key: PageCacheKey) {
        self.lru.retain(|k| *k != key);
        self.lru.push_front(key);
    }

    fn enforce_limit(&mut self) {
        while self.entries.len() > self.capacity {
            match self.lru.pop_back() {
                Some(key) => {
                    if self.entries.remove(&key).is_some() {
                        self.stats.evictions += 1;
                    }
                }
                None => break,
            }
        }
    }
}
