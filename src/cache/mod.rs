//! Bounded request/response cache.
//!
//! [`CacheStore`] is a fixed-capacity key→entry table with strict
//! least-recently-used eviction. LRU is preferred over FIFO here:
//! repeated prompts — exactly what the cache optimizes for — must
//! survive insert pressure from one-off prompts. Recency order is total
//! (the backing list is updated on every access), so the documented
//! tie-break by earliest `created_at` cannot arise in practice; it is
//! the policy on record should the order structure ever change.
//!
//! # Concurrency
//!
//! One mutex guards the entry table together with its access-order
//! list, keeping lookup and insert O(1) bounded-time critical sections.
//! At the intended scale (around a hundred entries) a single lock
//! domain is correct and sufficient; sharding would be an optimization,
//! not a correctness requirement.
//!
//! # Mutation discipline
//!
//! Entries are immutable once stored except for `last_accessed_at`
//! bookkeeping, which only [`lookup()`](CacheStore::lookup) performs.
//! All mutation goes through the store's operations; callers receive
//! clones, never references into the table.

pub mod key;

pub use key::{CacheKey, KeyFields};

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Instant;

use lru::LruCache;
use tracing::debug;

use crate::telemetry;

/// Default maximum number of cached generations.
pub const DEFAULT_CAPACITY: usize = 100;

/// One cached generation.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Fingerprint this entry is stored under.
    pub key: CacheKey,
    /// Generated text.
    pub text: String,
    /// Number of output tokens the generation produced.
    pub token_count: u32,
    /// When the entry was stored.
    pub created_at: Instant,
    /// When the entry was last returned by a lookup.
    pub last_accessed_at: Instant,
}

/// Thread-safe bounded store with strict LRU eviction.
pub struct CacheStore {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl CacheStore {
    /// Create a store holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up an entry, marking it most-recently-used on hit.
    ///
    /// A hit updates the entry's `last_accessed_at`; a miss has no side
    /// effect on the store.
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut entries = lock_entries(&self.entries);
        let entry = entries.get_mut(key)?;
        entry.last_accessed_at = Instant::now();
        Some(entry.clone())
    }

    /// Insert a generation, evicting the least-recently-used entry if full.
    ///
    /// Idempotent under races: if the key is already present the existing
    /// entry is returned unchanged (first writer wins), preserving
    /// determinism for every caller that observed the same generation
    /// episode. At most one entry is evicted per insertion.
    pub fn insert(&self, key: CacheKey, text: String, token_count: u32) -> CacheEntry {
        let mut entries = lock_entries(&self.entries);
        if let Some(existing) = entries.peek(&key) {
            return existing.clone();
        }

        let now = Instant::now();
        let entry = CacheEntry {
            key,
            text,
            token_count,
            created_at: now,
            last_accessed_at: now,
        };
        if let Some((evicted_key, _)) = entries.push(key, entry.clone()) {
            debug!(key = %evicted_key, "evicted least-recently-used entry");
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
        }
        metrics::gauge!(telemetry::CACHE_ENTRIES).set(entries.len() as f64);
        entry
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        lock_entries(&self.entries).len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity bound.
    pub fn capacity(&self) -> usize {
        lock_entries(&self.entries).cap().get()
    }
}

/// A poisoned lock still holds consistent cache data (panics can only
/// originate outside the critical sections above), so recover the guard
/// rather than propagating the poison.
fn lock_entries(
    entries: &Mutex<LruCache<CacheKey, CacheEntry>>,
) -> std::sync::MutexGuard<'_, LruCache<CacheKey, CacheEntry>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenerateRequest;

    fn key_for(prompt: &str) -> CacheKey {
        CacheKey::derive(&GenerateRequest::new(prompt), &KeyFields::default())
    }

    fn store(capacity: usize) -> CacheStore {
        CacheStore::new(NonZeroUsize::new(capacity).expect("positive capacity"))
    }

    #[test]
    fn miss_then_hit() {
        let cache = store(10);
        let key = key_for("a");
        assert!(cache.lookup(&key).is_none());

        cache.insert(key, "text".into(), 3);
        let hit = cache.lookup(&key).expect("hit");
        assert_eq!(hit.text, "text");
        assert_eq!(hit.token_count, 3);
    }

    #[test]
    fn insert_is_first_writer_wins() {
        let cache = store(10);
        let key = key_for("a");
        let first = cache.insert(key, "first".into(), 1);
        let second = cache.insert(key, "second".into(), 2);
        assert_eq!(second.text, "first");
        assert_eq!(second.token_count, first.token_count);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn hit_updates_last_accessed_at() {
        let cache = store(10);
        let key = key_for("a");
        let inserted = cache.insert(key, "text".into(), 1);
        let hit = cache.lookup(&key).expect("hit");
        assert!(hit.last_accessed_at >= inserted.last_accessed_at);
        assert_eq!(hit.created_at, inserted.created_at);
    }

    #[test]
    fn capacity_bound_holds_with_one_eviction_per_insert() {
        let cache = store(100);
        for i in 0..=100 {
            cache.insert(key_for(&format!("prompt-{i}")), "t".into(), 1);
            assert!(cache.len() <= 100);
        }
        assert_eq!(cache.len(), 100);
        // The 101st distinct insert evicted exactly the oldest untouched key.
        assert!(cache.lookup(&key_for("prompt-0")).is_none());
        assert!(cache.lookup(&key_for("prompt-1")).is_some());
        assert!(cache.lookup(&key_for("prompt-100")).is_some());
    }

    #[test]
    fn lookup_refreshes_recency_for_eviction() {
        // capacity=2: insert A, B; touch A; insert C → B evicted, A and C remain.
        let cache = store(2);
        let (a, b, c) = (key_for("A"), key_for("B"), key_for("C"));
        cache.insert(a, "a".into(), 1);
        cache.insert(b, "b".into(), 1);
        assert!(cache.lookup(&a).is_some());
        cache.insert(c, "c".into(), 1);

        assert!(cache.lookup(&b).is_none());
        assert!(cache.lookup(&a).is_some());
        assert!(cache.lookup(&c).is_some());
        assert_eq!(cache.len(), 2);
    }
}
