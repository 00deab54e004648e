use crate::base::ParamKey;
use lru::LruCache;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock,
};

/// LRU-bounded map from parameter values to shared atomic counters. The
/// bound keeps the per-value state from growing with the key cardinality;
/// evicted values simply restart cold.
#[derive(Debug)]
pub struct ParamCounter {
    cache: RwLock<LruCache<ParamKey, Arc<AtomicU64>>>,
}

impl ParamCounter {
    pub fn with_capacity(cap: usize) -> ParamCounter {
        ParamCounter {
            cache: RwLock::new(LruCache::new(cap)),
        }
    }

    pub fn cap(&self) -> usize {
        self.cache.read().unwrap().cap()
    }

    /// Stores a value for the key, updating the "recently used"-ness.
    pub fn add(&self, key: ParamKey, value: u64) {
        let mut cache = self.cache.write().unwrap();
        if let Some(counter) = cache.get(&key) {
            counter.store(value, Ordering::SeqCst);
        } else {
            cache.put(key, Arc::new(AtomicU64::new(value)));
        }
    }

    /// If the key is absent, stores `value` and returns `None`.
    /// If the key exists, returns the prior counter untouched.
    pub fn add_if_absent(&self, key: ParamKey, value: u64) -> Option<Arc<AtomicU64>> {
        let mut cache = self.cache.write().unwrap();
        if cache.contains(&key) {
            cache.get(&key).map(Arc::clone)
        } else {
            cache.put(key, Arc::new(AtomicU64::new(value)));
            None
        }
    }

    /// Returns the key's counter, updating the "recently used"-ness.
    pub fn get(&self, key: &str) -> Option<Arc<AtomicU64>> {
        self.cache.write().unwrap().get(key).map(Arc::clone)
    }

    /// Removes a key; returns whether it was contained.
    pub fn remove(&self, key: &str) -> bool {
        self.cache.write().unwrap().pop(key).is_some()
    }

    /// Checks membership without updating the recent-ness.
    pub fn contains(&self, key: &str) -> bool {
        self.cache.read().unwrap().contains(key)
    }

    /// Keys in the cache, from oldest to newest.
    pub fn keys(&self) -> Vec<ParamKey> {
        let cache = self.cache.read().unwrap();
        cache.iter().rev().map(|(k, _v)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge(&self) {
        self.cache.write().unwrap().clear()
    }
}

impl Default for ParamCounter {
    fn default() -> ParamCounter {
        ParamCounter::with_capacity(0)
    }
}
