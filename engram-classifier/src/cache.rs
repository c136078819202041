//! Globally shared LRU cache of per-user models.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use engram_core::constants::CLASSIFIER_CACHE_CAP;
use lru::LruCache;

use crate::model::LinearModel;

/// LRU cache keyed by user id, capped at 100 users. Entries are
/// invalidated whenever training stores a new version.
pub struct ClassifierCache {
    inner: Mutex<LruCache<String, Arc<LinearModel>>>,
}

impl Default for ClassifierCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierCache {
    pub fn new() -> Self {
        Self::with_capacity(CLASSIFIER_CACHE_CAP)
    }

    pub fn with_capacity(cap: usize) -> Self {
        let cap = NonZeroUsize::new(cap.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn get(&self, user_id: &str) -> Option<Arc<LinearModel>> {
        self.inner.lock().unwrap().get(user_id).cloned()
    }

    pub fn put(&self, user_id: &str, model: Arc<LinearModel>) {
        self.inner.lock().unwrap().put(user_id.to_string(), model);
    }

    pub fn invalidate(&self, user_id: &str) {
        self.inner.lock().unwrap().pop(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_invalidate() {
        let cache = ClassifierCache::new();
        cache.put("alice", Arc::new(LinearModel::empty(8)));
        assert!(cache.get("alice").is_some());
        cache.invalidate("alice");
        assert!(cache.get("alice").is_none());
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let cache = ClassifierCache::with_capacity(2);
        cache.put("a", Arc::new(LinearModel::empty(1)));
        cache.put("b", Arc::new(LinearModel::empty(1)));
        // Touch "a" so "b" is the eviction candidate.
        let _ = cache.get("a");
        cache.put("c", Arc::new(LinearModel::empty(1)));
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }
}
