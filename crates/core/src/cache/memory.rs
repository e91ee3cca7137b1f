//! Shared string cache capability.
//!
//! The dedup engine, fingerprint resolver and enrichment pipeline only ever
//! need `get`/`set` on strings, so they depend on [`StringCache`] rather than
//! on a concrete cache. [`MemoryCache`] is the mutex-guarded implementation
//! worker tasks share; persistent caches wrap one.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::sized::SizedCache;

/// Minimal string key/value capability.
///
/// Implementations must be safe to call from many tasks at once.
pub trait StringCache: Send + Sync {
    /// Look up `key`, counting the lookup as a use for recency.
    fn get(&self, key: &str) -> Option<String>;

    /// Insert or replace `key`.
    fn set(&self, key: &str, value: String);
}

/// In-memory [`StringCache`] backed by a [`SizedCache`] behind one mutex.
///
/// Recency bookkeeping mutates on every `get`, so reads take the lock too.
/// The lock is never held across an await point.
#[derive(Debug)]
pub struct MemoryCache {
    inner: Mutex<SizedCache<String>>,
}

impl MemoryCache {
    pub fn new(capacity: u64) -> Self {
        Self::from_sized(SizedCache::new(capacity))
    }

    pub fn from_sized(cache: SizedCache<String>) -> Self {
        Self { inner: Mutex::new(cache) }
    }

    // A panic while holding the lock cannot leave the LRU half-updated in a
    // way later calls would trip over, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, SizedCache<String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Presence check that does not touch recency.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn size(&self) -> u64 {
        self.lock().size()
    }

    pub fn capacity(&self) -> u64 {
        self.lock().capacity()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Owned copy of the entries, least-recently-used first.
    pub fn items(&self) -> Vec<(String, String)> {
        self.lock()
            .items()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

impl StringCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.lock().set(key, value);
    }
}
