// src/runtime/result_cache.rs
//! Fingerprint-keyed result memoization
//!
//! Avoids redundant `process_task` invocations for repeated-equivalent
//! tasks. Entries are never mutated in place (replace-on-recompute only) and
//! growth is bounded two ways: TTL expiry checked on read, and eviction of
//! the oldest entry once `max_entries` is exceeded on write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::trace;

/// A memoized task result
struct CacheEntry {
    result: serde_json::Value,
    recorded_at: Instant,
}

/// Bounded fingerprint → result cache
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,

    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a live entry; expired entries are removed and count as misses
    pub fn get(&self, fingerprint: &str) -> Option<serde_json::Value> {
        let expired = match self.entries.get(fingerprint) {
            Some(entry) if entry.recorded_at.elapsed() <= self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(fingerprint, "cache hit");
                return Some(entry.result.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // The read guard is released above; safe to remove now
            self.entries.remove(fingerprint);
            trace!(fingerprint, "cache entry expired");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a result, replacing any previous entry for the fingerprint
    pub fn insert(&self, fingerprint: String, result: serde_json::Value) {
        self.entries.insert(
            fingerprint,
            CacheEntry {
                result,
                recorded_at: Instant::now(),
            },
        );

        while self.entries.len() > self.max_entries {
            self.evict_oldest();
        }
    }

    /// Evict the entry with the oldest `recorded_at`
    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.recorded_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            trace!(fingerprint = %key, "evicted oldest cache entry");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of cache counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate over all lookups, 0.0 when no lookups happened
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache(ttl_ms: u64, max: usize) -> ResultCache {
        ResultCache::new(Duration::from_millis(ttl_ms), max)
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = cache(1000, 10);

        assert!(cache.get("fp_1").is_none());
        cache.insert("fp_1".to_string(), json!({"ok": true}));
        assert_eq!(cache.get("fp_1"), Some(json!({"ok": true})));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = cache(20, 10);

        cache.insert("fp_1".to_string(), json!(1));
        std::thread::sleep(Duration::from_millis(40));

        assert!(cache.get("fp_1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = cache(10_000, 2);

        cache.insert("fp_1".to_string(), json!(1));
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("fp_2".to_string(), json!(2));
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("fp_3".to_string(), json!(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("fp_1").is_none());
        assert_eq!(cache.get("fp_2"), Some(json!(2)));
        assert_eq!(cache.get("fp_3"), Some(json!(3)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_replace_on_recompute() {
        let cache = cache(10_000, 10);

        cache.insert("fp_1".to_string(), json!("old"));
        cache.insert("fp_1".to_string(), json!("new"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fp_1"), Some(json!("new")));
    }

    #[test]
    fn test_hit_rate() {
        let cache = cache(10_000, 10);
        assert_eq!(cache.stats().hit_rate(), 0.0);

        cache.insert("fp_1".to_string(), json!(1));
        cache.get("fp_1");
        cache.get("fp_missing");

        let stats = cache.stats();
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
