//! Weight-bounded LRU cache.
//!
//! Capacity is measured in the cumulative weight of the stored values (bytes
//! for strings), not in entry count. Recency is tracked by access: `get`
//! promotes just like `set` does.

use lru::LruCache;

/// A value with a declared size in bytes.
pub trait Weighted {
    fn weight(&self) -> u64;
}

impl Weighted for String {
    fn weight(&self) -> u64 {
        self.len() as u64
    }
}

/// LRU cache keyed by string whose capacity is a total value weight.
///
/// After every [`SizedCache::set`] the total weight is at most the capacity.
/// A value heavier than the whole capacity is accepted and then evicts every
/// entry, itself included, so a zero-capacity cache stays empty rather than
/// failing.
#[derive(Debug)]
pub struct SizedCache<V> {
    entries: LruCache<String, V>,
    size: u64,
    capacity: u64,
}

impl<V: Weighted> SizedCache<V> {
    /// Create an empty cache holding at most `capacity` bytes of values.
    pub fn new(capacity: u64) -> Self {
        Self { entries: LruCache::unbounded(), size: 0, capacity }
    }

    /// Insert or replace `key`, then evict least-recently-used entries until
    /// the total weight fits.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        let weight = value.weight();
        if let Some(old) = self.entries.put(key.into(), value) {
            self.size = self.size.saturating_sub(old.weight());
        }
        self.size += weight;
        self.evict();
    }

    /// Look up `key`, marking it most-recently-used on a hit.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Presence check that leaves recency untouched.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let value = self.entries.pop(key)?;
        self.size = self.size.saturating_sub(value.weight());
        Some(value)
    }

    /// Current cumulative weight.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.size = 0;
    }

    /// Entries ordered least-recently-used first.
    ///
    /// Re-inserting them in this order into an empty cache reproduces the
    /// same relative recency, which is what snapshots rely on.
    pub fn items(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().rev().map(|(k, v)| (k.as_str(), v))
    }

    fn evict(&mut self) {
        while self.size > self.capacity {
            match self.entries.pop_lru() {
                Some((key, value)) => {
                    self.size = self.size.saturating_sub(value.weight());
                    tracing::trace!(key = %key, weight = value.weight(), "evicted");
                }
                None => {
                    self.size = 0;
                    break;
                }
            }
        }
    }
}
