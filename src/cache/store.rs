//! Expiring cache store with sliding idle TTL

use crate::cache::{
    config::CacheConfig,
    entry::CacheEntry,
    invalidation::{InvalidationEvent, InvalidationReason},
    scheduler::ExpiryQueue,
    types::CacheStats,
};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Key/value cache whose entries expire after an idle period
///
/// This implementation provides:
/// - Thread-safe async access via RwLock
/// - Sliding TTL: every `get`, `has` or `set` restarts the key's countdown
/// - A single background sweeper per cache instead of one timer per key
/// - Hit/miss/expiry metrics
///
/// Reads never return an entry past its deadline, even if the sweeper has
/// not removed it yet.
pub struct ExpiringCache<K, V> {
    /// Cache configuration
    config: CacheConfig,

    /// Internal storage
    store: Arc<RwLock<CacheStore<K, V>>>,

    /// Wakes the sweeper when a new deadline is queued
    wakeup: Arc<Notify>,

    /// Background sweeper, if one is running
    sweeper: Option<JoinHandle<()>>,
}

/// Internal cache storage
struct CacheStore<K, V> {
    /// Main storage: key -> entry
    entries: HashMap<K, CacheEntry<V>>,

    /// Pending expiration checks
    queue: ExpiryQueue<K>,

    /// Current cache statistics
    stats: CacheStats,

    /// Next slot id handed to a new entry
    next_slot: u64,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Drop every entry whose deadline has passed, returning their keys
    fn sweep(&mut self, now: Instant) -> Vec<K> {
        let mut expired = Vec::new();

        while let Some(record) = self.queue.pop_due(now) {
            let Some(entry) = self.entries.get(&record.key) else {
                continue;
            };

            // Record belongs to a removed or replaced entry
            if entry.slot != record.slot {
                continue;
            }

            let expires_at = entry.expires_at;
            match expires_at {
                Some(at) if at <= now => {
                    self.entries.remove(&record.key);
                    expired.push(record.key);
                }
                // Touched since the record was queued
                Some(at) => self.queue.schedule(record.key, record.slot, at),
                None => {}
            }
        }

        self.stats.evictions_ttl += expired.len() as u64;
        self.stats.entries = self.entries.len();
        expired
    }

    /// Queue a fresh record when an entry's deadline moved before
    /// `previous`
    ///
    /// Jitter can give a touched or overwritten entry an earlier deadline
    /// than the record already queued for it. The entry gets a new slot so
    /// the old record is dropped when it pops. Returns whether a record was
    /// queued.
    fn requeue_if_earlier(&mut self, key: &K, previous: Option<Instant>) -> bool {
        let slot = self.next_slot;
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };

        match (previous, entry.expires_at) {
            (Some(before), Some(after)) if after < before => {
                entry.slot = slot;
                self.next_slot += 1;
                self.queue.schedule(key.clone(), slot, after);
                true
            }
            _ => false,
        }
    }

    /// Remove a single entry that was found expired on access
    fn expire(&mut self, key: &K) {
        if self.entries.remove(key).is_some() {
            self.stats.evictions_ttl += 1;
            self.stats.entries = self.entries.len();
        }
    }
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given configuration
    ///
    /// When expiry is enabled and a Tokio runtime is available, a background
    /// sweeper is spawned on it. Without a runtime, expired entries are
    /// dropped lazily on access and by `cleanup_expired`.
    pub fn new(config: CacheConfig) -> Self {
        info!("Initializing expiring cache with config: {:?}", config);

        let store = Arc::new(RwLock::new(CacheStore {
            entries: HashMap::new(),
            queue: ExpiryQueue::default(),
            stats: CacheStats::default(),
            next_slot: 0,
        }));
        let wakeup = Arc::new(Notify::new());

        let sweeper = if config.expires() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => Some(handle.spawn(run_sweeper(
                    Arc::downgrade(&store),
                    Arc::clone(&wakeup),
                ))),
                Err(_) => {
                    warn!("No Tokio runtime available, expiring cache entries lazily");
                    None
                }
            }
        } else {
            None
        };

        Self {
            config,
            store,
            wakeup,
            sweeper,
        }
    }

    /// Get the cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Insert or overwrite a value, restarting the key's idle countdown
    pub async fn set(&self, key: K, value: V) {
        let now = Instant::now();
        let ttl = self.config.ttl_with_jitter();
        let mut store = self.store.write().await;

        store.stats.inserts += 1;

        // An expired entry still in the map is replaced, not refreshed
        let expired = store.entries.get(&key).map(|e| e.is_expired_at(now));
        if expired == Some(true) {
            store.expire(&key);
        }

        if let Some(existing) = store.entries.get_mut(&key) {
            debug!("Updating existing cache entry: {:?}", key);
            let previous = existing.expires_at;
            existing.update_value(value, now, ttl);
            if store.requeue_if_earlier(&key, previous) {
                self.wakeup.notify_one();
            }
        } else {
            debug!("Inserting new cache entry: {:?}", key);
            let slot = store.next_slot;
            store.next_slot += 1;

            let entry = CacheEntry::new(value, slot, now, ttl);
            if let Some(deadline) = entry.expires_at {
                store.queue.schedule(key.clone(), slot, deadline);
                self.wakeup.notify_one();
            }
            store.entries.insert(key, entry);
            store.stats.entries = store.entries.len();
        }
    }

    /// Get a value, restarting the key's idle countdown
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut store = self.store.write().await;

        match store.entries.get(key).map(|e| e.is_expired_at(now)) {
            Some(true) => {
                debug!("Cache entry expired: {:?}", key);
                store.expire(key);
                store.stats.misses += 1;
                None
            }
            Some(false) => {
                let ttl = self.config.ttl_with_jitter();
                let entry = store.entries.get_mut(key)?;
                let previous = entry.expires_at;
                entry.touch(now, ttl);
                let value = entry.value.clone();
                if store.requeue_if_earlier(key, previous) {
                    self.wakeup.notify_one();
                }
                store.stats.hits += 1;

                debug!("Cache hit: {:?}", key);
                Some(value)
            }
            None => {
                debug!("Cache miss: {:?}", key);
                store.stats.misses += 1;
                None
            }
        }
    }

    /// Check if a key exists, restarting its idle countdown like `get`
    pub async fn has(&self, key: &K) -> bool {
        let now = Instant::now();
        let mut store = self.store.write().await;

        match store.entries.get(key).map(|e| e.is_expired_at(now)) {
            Some(true) => {
                store.expire(key);
                false
            }
            Some(false) => {
                let ttl = self.config.ttl_with_jitter();
                if let Some(entry) = store.entries.get_mut(key) {
                    let previous = entry.expires_at;
                    entry.touch(now, ttl);
                    if store.requeue_if_earlier(key, previous) {
                        self.wakeup.notify_one();
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Check if a key exists (without updating access time)
    pub async fn contains_key(&self, key: &K) -> bool {
        let now = Instant::now();
        let store = self.store.read().await;
        store
            .entries
            .get(key)
            .map_or(false, |e| !e.is_expired_at(now))
    }

    /// Get a value without updating access time or hit/miss counters
    pub async fn peek(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let store = self.store.read().await;
        store
            .entries
            .get(key)
            .filter(|e| !e.is_expired_at(now))
            .map(|e| e.value.clone())
    }

    /// Remove a specific entry from the cache
    pub async fn remove(&self, key: &K) -> Option<V> {
        let mut store = self.store.write().await;

        let entry = store.entries.remove(key)?;
        store.stats.entries = store.entries.len();
        store.stats.invalidations += 1;

        debug!("Removed cache entry: {:?}", key);
        Some(entry.value)
    }

    /// Remove the given keys, reporting which of them were cached
    pub async fn invalidate(&self, keys: &[K]) -> InvalidationEvent {
        let mut store = self.store.write().await;

        let removed: Vec<String> = keys
            .iter()
            .filter(|key| store.entries.remove(*key).is_some())
            .map(|key| format!("{:?}", key))
            .collect();
        store.stats.entries = store.entries.len();
        store.stats.invalidations += removed.len() as u64;

        debug!("Invalidated {} of {} keys", removed.len(), keys.len());
        InvalidationEvent::new(InvalidationReason::Manual, removed)
    }

    /// Clear all entries from the cache
    pub async fn clear(&self) -> InvalidationEvent {
        let mut store = self.store.write().await;

        let keys: Vec<String> = store.entries.keys().map(|k| format!("{:?}", k)).collect();
        store.entries.clear();
        store.queue.clear();
        store.stats.entries = 0;
        store.stats.invalidations += keys.len() as u64;

        info!("Cleared {} entries from cache", keys.len());
        InvalidationEvent::new(InvalidationReason::Cleared, keys)
    }

    /// Remove all expired entries now instead of waiting for the sweeper
    pub async fn cleanup_expired(&self) -> Vec<InvalidationEvent> {
        let mut store = self.store.write().await;
        let expired = store.sweep(Instant::now());

        if expired.is_empty() {
            return Vec::new();
        }

        debug!("Cleaned up {} expired entries", expired.len());
        let keys: Vec<String> = expired.iter().map(|k| format!("{:?}", k)).collect();
        let context = format!("Cleaned up {} expired entries", keys.len());
        vec![InvalidationEvent::new(InvalidationReason::Expired, keys).with_context(context)]
    }

    /// Keys of all live entries
    pub async fn keys(&self) -> Vec<K> {
        let now = Instant::now();
        let store = self.store.read().await;
        store
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let store = self.store.read().await;
        if self.config.enable_metrics {
            store.stats.clone()
        } else {
            CacheStats {
                entries: store.entries.len(),
                ..Default::default()
            }
        }
    }

    /// Get number of entries in cache
    pub async fn len(&self) -> usize {
        let store = self.store.read().await;
        store.entries.len()
    }

    /// Check if cache is empty
    pub async fn is_empty(&self) -> bool {
        let store = self.store.read().await;
        store.entries.is_empty()
    }

    /// Whether a background sweeper is running for this cache
    pub fn has_sweeper(&self) -> bool {
        self.sweeper.is_some()
    }
}

impl<K, V> Drop for ExpiringCache<K, V> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

/// Background task that drops entries as their deadlines pass
///
/// Sleeps until the earliest queued deadline or until a new entry is
/// queued, whichever comes first. Exits once the cache is dropped.
async fn run_sweeper<K, V>(store: Weak<RwLock<CacheStore<K, V>>>, wakeup: Arc<Notify>)
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    debug!("Starting expiring cache sweeper");

    loop {
        let next_deadline = {
            let Some(store) = store.upgrade() else {
                break;
            };
            let mut guard = store.write().await;
            let expired = guard.sweep(Instant::now());
            if !expired.is_empty() {
                debug!(
                    "Expired {} idle entries: {:?} ({} checks queued)",
                    expired.len(),
                    expired,
                    guard.queue.len()
                );
            }
            guard.queue.next_deadline()
        };

        match next_deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = wakeup.notified() => {}
                }
            }
            None => wakeup.notified().await,
        }
    }

    debug!("Expiring cache sweeper stopped");
}
