//! In-process result cache.
//!
//! Bounded map from a hash of (normalized text, options) to a finished
//! [`DetectionResult`]. On overflow the entry with the fewest hits is evicted,
//! ties broken by oldest insertion. Entries past the TTL are dropped lazily
//! on lookup.
//!
//! All access goes through one mutex. Entries are replaced whole, never
//! mutated field by field, and every read hands out a clone.

pub mod persistent;

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;
use crate::language::{DetectionOptions, DetectionResult};

/// Cache key: a 64-bit hash of the normalized text and result-relevant options.
pub type CacheKey = u64;

/// Compute the cache key for a normalized text under `options`.
///
/// `timeout_ms` and `bypass_cache` do not change which verdict is correct, so
/// they are not part of the key.
pub fn cache_key(normalized: &str, options: &DetectionOptions) -> CacheKey {
    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    options.offline.hash(&mut hasher);
    options.min_confidence.to_bits().hash(&mut hasher);
    hasher.finish()
}

/// Key for the persistent store. Depends on the text only, since a remote
/// verdict does not depend on per-call options.
pub fn text_key(normalized: &str) -> String {
    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    format!("darija:remote:{:016x}", hasher.finish())
}

/// Counters describing cache behavior. Advisory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    /// Hits over lookups, or 0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: DetectionResult,
    inserted_at: Instant,
    hit_count: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Bounded, TTL-limited result cache.
#[derive(Debug)]
pub struct ResultCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity, Duration::from_secs(config.ttl_secs))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up a result, counting the hit. Expired entries are removed.
    pub fn get(&self, key: CacheKey) -> Option<DetectionResult> {
        let mut inner = self.lock();
        let expired = match inner.entries.get(&key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => {
                inner.misses += 1;
                return None;
            }
        };

        if expired {
            inner.entries.remove(&key);
            inner.expirations += 1;
            inner.misses += 1;
            return None;
        }

        inner.hits += 1;
        let entry = inner.entries.get_mut(&key)?;
        entry.hit_count += 1;
        Some(entry.result.clone())
    }

    /// Insert or replace a result, evicting if the cache is full.
    pub fn put(&self, key: CacheKey, result: DetectionResult) {
        let mut inner = self.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            if let Some(victim) = Self::victim(&inner.entries) {
                inner.entries.remove(&victim);
                inner.evictions += 1;
                tracing::trace!(key = victim, "evicted cache entry");
            }
        }
        inner.entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at: Instant::now(),
                hit_count: 0,
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            size: inner.entries.len(),
            capacity: self.capacity,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
        }
    }

    /// Drop all entries and reset counters.
    pub fn clear(&self) {
        *self.lock() = Inner::default();
    }

    /// Fewest hits first, then oldest insertion.
    fn victim(entries: &HashMap<CacheKey, CacheEntry>) -> Option<CacheKey> {
        entries
            .iter()
            .min_by(|(_, a), (_, b)| {
                a.hit_count
                    .cmp(&b.hit_count)
                    .then(a.inserted_at.cmp(&b.inserted_at))
            })
            .map(|(k, _)| *k)
    }

    // A poisoned lock only means another detection panicked mid-call; entries
    // are swapped whole, so the map is still consistent.
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
