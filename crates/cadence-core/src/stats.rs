//! Cache statistics tracking

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lifetime counters for a cache, updated without taking the map lock
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// A live entry was returned on the fast path
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// No live entry; the caller went for the load lock
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A miss that found the entry already loaded once it held the load lock
    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn load_failures(&self) -> u64 {
        self.load_failures.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of a cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats<K> {
    /// Number of cached entries, live or not yet swept
    pub entries: usize,
    /// Configured capacity
    pub max_size: usize,
    /// Configured TTL
    pub ttl: Duration,
    /// Cached keys in ascending order
    pub keys: Vec<K>,
    /// Age of the oldest entry, `Duration::ZERO` when empty
    pub oldest_age: Duration,
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub invalidations: u64,
}

impl<K> CacheStats<K> {
    pub(crate) fn new(
        keys: Vec<K>,
        max_size: usize,
        ttl: Duration,
        oldest_age: Duration,
        counters: &CacheCounters,
    ) -> Self {
        Self {
            entries: keys.len(),
            max_size,
            ttl,
            keys,
            oldest_age,
            hits: counters.hits(),
            misses: counters.misses(),
            coalesced: counters.coalesced(),
            loads: counters.loads(),
            load_failures: counters.load_failures(),
            evictions: counters.evictions(),
            expirations: counters.expirations(),
            invalidations: counters.invalidations(),
        }
    }

    /// Requests served, counting a coalesced miss as a hit
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of requests that did not run the loader (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            (self.hits + self.coalesced) as f64 / total as f64
        }
    }
}
