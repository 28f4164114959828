//! Keyed model cache with TTL expiry and per-key load deduplication
//!
//! Resources are loaded through an injected [`ResourceLoader`] the first time a
//! key is requested and served from memory until their TTL runs out. When the
//! cache is full, the entry with the oldest load time makes room. Concurrent
//! requests for the same cold key share a single load; requests for other keys
//! are never held up by it.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::config::ModelCacheConfig;
use crate::loader::ResourceLoader;
use crate::stats::{CacheCounters, CacheStats};
use crate::{CoreError, Result};

/// Cleanup callback run on every resource leaving the cache
/// (capacity eviction, expiry, invalidation or `clear`).
///
/// Errors and panics are logged and otherwise ignored.
pub type EvictionHook<K, R> = Arc<dyn Fn(&K, &R) -> anyhow::Result<()> + Send + Sync>;

type LoadLock = Arc<Mutex<()>>;

/// A loaded resource and the time it was loaded
#[derive(Debug)]
struct CacheEntry<R> {
    resource: Arc<R>,
    loaded_at: Instant,
}

impl<R> CacheEntry<R> {
    fn new(resource: Arc<R>) -> Self {
        Self {
            resource,
            loaded_at: Instant::now(),
        }
    }

    fn is_live(&self, ttl: Duration) -> bool {
        self.loaded_at.elapsed() < ttl
    }
}

/// Why an entry left the map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Capacity,
    Expired,
    Invalidated,
}

struct Removed<K, R> {
    key: K,
    resource: Arc<R>,
    reason: Removal,
}

/// Cache of expensive resources keyed by `K`
pub struct ModelCache<K, C, R> {
    config: ModelCacheConfig,
    ttl: Duration,
    loader: Arc<dyn ResourceLoader<K, C, R>>,
    on_evict: Option<EvictionHook<K, R>>,
    entries: RwLock<HashMap<K, CacheEntry<R>>>,
    load_locks: DashMap<K, LoadLock>,
    counters: CacheCounters,
}

impl<K, C, R> ModelCache<K, C, R>
where
    K: Eq + Hash + Ord + Clone + Debug + Send + Sync + 'static,
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Create a cache that loads through `loader`
    pub fn new<L>(config: ModelCacheConfig, loader: L) -> Result<Self>
    where
        L: ResourceLoader<K, C, R> + 'static,
    {
        Self::with_shared_loader(config, Arc::new(loader))
    }

    /// Create a cache around a loader that is also used elsewhere
    pub fn with_shared_loader(
        config: ModelCacheConfig,
        loader: Arc<dyn ResourceLoader<K, C, R>>,
    ) -> Result<Self> {
        config.validate()?;

        info!(
            max_size = config.max_size,
            ttl_ms = config.ttl_ms,
            "Initializing model cache"
        );

        Ok(Self {
            ttl: config.ttl(),
            config,
            loader,
            on_evict: None,
            entries: RwLock::new(HashMap::new()),
            load_locks: DashMap::new(),
            counters: CacheCounters::new(),
        })
    }

    /// Register the cleanup callback run on every removed resource
    pub fn with_eviction_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&K, &R) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_evict = Some(Arc::new(hook));
        self
    }

    /// Get the resource for `key`, loading it with `config` if absent or expired.
    ///
    /// At most one load per key runs at a time; callers arriving while it runs
    /// wait for it and then reuse its result, or retry the load themselves if
    /// it failed. A loader error leaves no entry behind.
    pub async fn get(&self, key: &K, config: &C) -> Result<Arc<R>> {
        if let Some(resource) = self.lookup_live(key) {
            self.counters.record_hit();
            trace!(key = ?key, "Model cache hit");
            return Ok(resource);
        }

        self.counters.record_miss();
        let permit = self.acquire_load_permit(key).await;

        // Another caller may have finished the load while we waited
        if let Some(resource) = self.lookup_live(key) {
            self.counters.record_coalesced();
            debug!(key = ?key, "Model loaded by a concurrent request");
            drop(permit);
            return Ok(resource);
        }

        let result = self.load_and_insert(key, config).await;
        drop(permit);
        result
    }

    /// Remove the entry for `key` and run its cleanup hook.
    ///
    /// Returns whether an entry was present; a missing key is not an error.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.entries.write().remove(key);

        match removed {
            Some(entry) => {
                debug!(key = ?key, "Invalidated cached model");
                self.release(vec![Removed {
                    key: key.clone(),
                    resource: entry.resource,
                    reason: Removal::Invalidated,
                }]);
                true
            }
            None => false,
        }
    }

    /// Remove every expired entry now instead of waiting for the next `get`
    pub fn cleanup_expired(&self) -> usize {
        let ttl = self.ttl;
        let removed: Vec<_> = {
            let mut entries = self.entries.write();
            let expired: Vec<K> = entries
                .iter()
                .filter(|(_, entry)| !entry.is_live(ttl))
                .map(|(key, _)| key.clone())
                .collect();

            expired
                .into_iter()
                .filter_map(|key| {
                    entries.remove(&key).map(|entry| Removed {
                        key,
                        resource: entry.resource,
                        reason: Removal::Expired,
                    })
                })
                .collect()
        };

        let count = removed.len();
        if count > 0 {
            debug!(count, "Cleaned up expired models");
        }
        self.release(removed);
        count
    }

    /// Remove all entries, running the cleanup hook for each
    pub fn clear(&self) {
        let removed: Vec<_> = self
            .entries
            .write()
            .drain()
            .map(|(key, entry)| Removed {
                key,
                resource: entry.resource,
                reason: Removal::Invalidated,
            })
            .collect();

        info!(cleared = removed.len(), "Cleared model cache");
        self.release(removed);
    }

    /// Snapshot of the cache. Does not expire or evict anything.
    pub fn stats(&self) -> CacheStats<K> {
        let (mut keys, oldest_age) = {
            let entries = self.entries.read();
            let keys: Vec<K> = entries.keys().cloned().collect();
            let oldest_age = entries
                .values()
                .map(|entry| entry.loaded_at)
                .min()
                .map(|loaded_at| loaded_at.elapsed())
                .unwrap_or(Duration::ZERO);
            (keys, oldest_age)
        };
        keys.sort();

        CacheStats::new(keys, self.config.max_size, self.ttl, oldest_age, &self.counters)
    }

    /// Whether a live entry exists for `key`
    pub fn contains(&self, key: &K) -> bool {
        self.lookup_live(key).is_some()
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn config(&self) -> &ModelCacheConfig {
        &self.config
    }

    /// Lifetime counters
    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    /// Start a background task calling [`cleanup_expired`](Self::cleanup_expired)
    /// every `interval`. The task ends once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    debug!("Model cache dropped, stopping sweeper");
                    break;
                };
                cache.cleanup_expired();
            }
        })
    }

    fn lookup_live(&self, key: &K) -> Option<Arc<R>> {
        let entries = self.entries.read();
        let resource = entries
            .get(key)
            .filter(|entry| entry.is_live(self.ttl))
            .map(|entry| Arc::clone(&entry.resource));
        resource
    }

    async fn acquire_load_permit<'a>(&'a self, key: &'a K) -> LoadPermit<'a, K> {
        let lock = Arc::clone(
            self.load_locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let guard = lock.lock_owned().await;
        LoadPermit {
            locks: &self.load_locks,
            key,
            guard: Some(guard),
        }
    }

    async fn load_and_insert(&self, key: &K, config: &C) -> Result<Arc<R>> {
        debug!(key = ?key, "Model cache miss, loading");
        let started = Instant::now();

        let resource = match self.loader.load(key, config).await {
            Ok(resource) => Arc::new(resource),
            Err(source) => {
                self.counters.record_load_failure();
                warn!(key = ?key, error = %source, "Model load failed");
                return Err(CoreError::load_failure(key, source));
            }
        };
        self.counters.record_load();

        let removed = self.insert(key.clone(), Arc::clone(&resource));
        self.release(removed);

        info!(
            key = ?key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded and cached model"
        );
        Ok(resource)
    }

    /// Insert a freshly loaded resource, making room first.
    ///
    /// Evicts only as many entries as needed for the map to stay within
    /// `max_size` once the new entry is in.
    fn insert(&self, key: K, resource: Arc<R>) -> Vec<Removed<K, R>> {
        let mut removed = Vec::new();
        let mut entries = self.entries.write();

        // Only reached after the live check failed under the load lock, so any
        // existing entry for this key is expired.
        if let Some(stale) = entries.remove(&key) {
            removed.push(Removed {
                key: key.clone(),
                resource: stale.resource,
                reason: Removal::Expired,
            });
        }

        while entries.len() >= self.config.max_size {
            let Some(oldest) = Self::oldest_key(&entries) else {
                break;
            };
            if let Some(entry) = entries.remove(&oldest) {
                removed.push(Removed {
                    key: oldest,
                    resource: entry.resource,
                    reason: Removal::Capacity,
                });
            }
        }

        entries.insert(key, CacheEntry::new(resource));
        removed
    }

    /// Entry with the smallest load time, ties going to the smallest key
    fn oldest_key(entries: &HashMap<K, CacheEntry<R>>) -> Option<K> {
        entries
            .iter()
            .min_by(|(ka, a), (kb, b)| a.loaded_at.cmp(&b.loaded_at).then_with(|| ka.cmp(kb)))
            .map(|(key, _)| key.clone())
    }

    /// Account for removed entries and run the cleanup hook on each.
    /// Must be called without the map lock held.
    fn release(&self, removed: Vec<Removed<K, R>>) {
        for Removed {
            key,
            resource,
            reason,
        } in removed
        {
            match reason {
                Removal::Capacity => {
                    self.counters.record_eviction();
                    info!(key = ?key, "Evicted oldest model to stay within capacity");
                }
                Removal::Expired => {
                    self.counters.record_expiration();
                    debug!(key = ?key, "Dropped expired model");
                }
                Removal::Invalidated => self.counters.record_invalidation(),
            }
            self.run_eviction_hook(&key, &resource);
        }
    }

    fn run_eviction_hook(&self, key: &K, resource: &R) {
        let Some(hook) = &self.on_evict else {
            return;
        };

        match catch_unwind(AssertUnwindSafe(|| hook(key, resource))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(key = ?key, error = %err, "Eviction hook failed"),
            Err(_) => error!(key = ?key, "Eviction hook panicked"),
        }
    }
}

impl<K: Eq + Hash, C, R> std::fmt::Debug for ModelCache<K, C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("max_size", &self.config.max_size)
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.read().len())
            .field("loads_in_flight", &self.load_locks.len())
            .finish()
    }
}

/// Exclusive right to load one key. Dropping it releases the per-key lock and
/// forgets the lock once nobody else holds or waits on it.
struct LoadPermit<'a, K: Eq + Hash> {
    locks: &'a DashMap<K, LoadLock>,
    key: &'a K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> Drop for LoadPermit<'_, K> {
    fn drop(&mut self) {
        self.guard.take();
        // Clones are only handed out under the shard lock, so a count of one
        // means no other caller holds or is waiting on this lock.
        self.locks
            .remove_if(self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
