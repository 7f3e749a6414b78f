//! Bounded tables of in-flight computations.
//!
//! A [`PromiseTable`] deduplicates concurrent callers: it maps canonical
//! keys to the [`PendingResult`] of the generation currently computing that
//! key. It is *not* the value cache — entries live only from slot claim to
//! settle. The LRU bound keeps the table from growing without limit when
//! upstream churns many distinct keys under failure.

use crate::promise::PendingResult;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Concurrent key → in-flight-result map with atomic insert-if-absent and an
/// access-order (LRU) capacity bound.
///
/// Every operation takes the single internal lock exactly once, which makes
/// `put_if_absent` linearizable. Eviction drops only the table's reference;
/// a waiter already holding a clone of the evicted [`PendingResult`] still
/// completes normally when its owner settles.
pub struct PromiseTable<V> {
    entries: Mutex<LruCache<String, PendingResult<V>>>,
}

impl<V: Clone> PromiseTable<V> {
    /// Create a table bounded to `capacity` in-flight entries.
    ///
    /// A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        PromiseTable {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Atomically install `promise` if no entry exists for `key`.
    ///
    /// Returns the prior entry (a cloned handle) when one is present, `None`
    /// when the install happened. Installing may evict the least-recently
    /// accessed entry; reading an existing entry promotes it.
    pub fn put_if_absent(&self, key: &str, promise: PendingResult<V>) -> Option<PendingResult<V>> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(key) {
            return Some(existing.clone());
        }
        entries.push(key.to_string(), promise);
        None
    }

    /// Look up the in-flight entry for `key`, promoting it.
    pub fn get(&self, key: &str) -> Option<PendingResult<V>> {
        self.entries.lock().get(key).cloned()
    }

    /// Remove the entry for `key`.
    ///
    /// Only the owning generation calls this (on settle); readers never
    /// remove. Missing keys are fine — the entry may have been evicted.
    pub fn remove(&self, key: &str) -> Option<PendingResult<V>> {
        self.entries.lock().pop(key)
    }

    /// Drop every entry. Outstanding promises stay valid for their holders.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of in-flight entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the table has no in-flight entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_if_absent_claims_once() {
        let table: PromiseTable<u32> = PromiseTable::new(8);
        let first = PendingResult::new();

        assert!(table.put_if_absent("k", first.clone()).is_none());

        // Second claim returns the in-flight entry, not the new one.
        let second = PendingResult::new();
        let prior = table
            .put_if_absent("k", second)
            .expect("Expected prior entry");
        first.resolve(Some(7));
        assert!(prior.is_terminal());
    }

    #[test]
    fn test_remove_and_reclaim() {
        let table: PromiseTable<u32> = PromiseTable::new(8);
        table.put_if_absent("k", PendingResult::new());
        assert!(table.remove("k").is_some());
        assert!(table.remove("k").is_none());
        assert!(table.put_if_absent("k", PendingResult::new()).is_none());
    }

    #[test]
    fn test_capacity_bound() {
        let table: PromiseTable<u32> = PromiseTable::new(4);
        for i in 0..32 {
            table.put_if_absent(&format!("k{}", i), PendingResult::new());
            assert!(table.len() <= 4);
        }
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let table: PromiseTable<u32> = PromiseTable::new(0);
        table.put_if_absent("k", PendingResult::new());
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_evicted_promise_still_completes() {
        let table: PromiseTable<u32> = PromiseTable::new(2);

        let evictee = PendingResult::new();
        table.put_if_absent("old", evictee.clone());

        let waiter = evictee.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });

        // Push the oldest entry out.
        table.put_if_absent("a", PendingResult::new());
        table.put_if_absent("b", PendingResult::new());
        assert!(table.get("old").is_none());

        // The owner settles as usual; the evicted waiter still gets its value.
        evictee.resolve(Some(9));
        let outcome = handle.await.expect("Waiter task failed");
        assert_eq!(outcome.expect("Expected success"), Some(9));
    }

    #[test]
    fn test_access_promotes_entry() {
        let table: PromiseTable<u32> = PromiseTable::new(2);
        table.put_if_absent("a", PendingResult::new());
        table.put_if_absent("b", PendingResult::new());

        // Touch "a" so "b" becomes the eviction candidate.
        assert!(table.get("a").is_some());
        table.put_if_absent("c", PendingResult::new());

        assert!(table.get("a").is_some());
        assert!(table.get("b").is_none());
    }

    #[test]
    fn test_clear() {
        let table: PromiseTable<u32> = PromiseTable::new(8);
        table.put_if_absent("a", PendingResult::new());
        table.put_if_absent("b", PendingResult::new());
        table.clear();
        assert!(table.is_empty());
    }
}
