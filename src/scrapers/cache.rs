//! In-process cache of resolved product URLs per strategy.
//!
//! Resolving a free-text query through the site UI is the most expensive
//! step of a browser-backed parse, and the same queries tend to repeat.
//! Entries have no TTL; a miss always falls back to full resolution.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use super::strategy::StrategyKind;

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    strategy: StrategyKind,
    query: String,
}

impl CacheKey {
    fn new(strategy: StrategyKind, query: &str) -> Option<Self> {
        let query = normalize_query(query);
        if query.is_empty() {
            return None;
        }
        Some(Self { strategy, query })
    }
}

/// Lowercased, trimmed form of a query used for keying.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Bounded LRU map of (strategy, query) to resolved URL.
pub struct QueryCache {
    entries: Mutex<LruCache<CacheKey, String>>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a resolved URL, promoting the entry on hit.
    pub fn get(&self, strategy: StrategyKind, query: &str) -> Option<String> {
        let key = CacheKey::new(strategy, query)?;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&key).cloned()
    }

    /// Insert or refresh a resolution, evicting the least recently used entry
    /// when over capacity. Empty queries or URLs are ignored.
    pub fn set(&self, strategy: StrategyKind, query: &str, url: &str) {
        if url.trim().is_empty() {
            return;
        }
        let Some(key) = CacheKey::new(strategy, query) else {
            return;
        };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.put(key, url.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cap()
            .get()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
