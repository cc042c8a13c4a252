use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

const DEFAULT_CAPACITY: usize = 10_000;

/// Per-text vector cache of one embedder instance.
pub struct EmbeddingCache {
    entries: Mutex<LruCache<String, Vec<f32>>>,
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl EmbeddingCache {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }

    /// Cached vector for `text`, computing and storing it on a miss.
    pub fn get_or_insert_with(&self, text: &str, compute: impl FnOnce() -> Vec<f32>) -> Vec<f32> {
        if let Some(hit) = self.entries.lock().get(text) {
            return hit.clone();
        }
        let value = compute();
        self.entries.lock().put(text.to_string(), value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
