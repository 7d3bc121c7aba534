//! Bounded cache store with FIFO (or optional LRU) eviction

use crate::cache::{
    entry::{CacheEntry, CacheMetadata},
    types::CacheStats,
};
use crate::config::EvictionPolicy;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Bounded key-value cache shared across the process
///
/// This implementation provides:
/// - Async access via RwLock
/// - A hard bound on the number of entries
/// - FIFO eviction: the earliest inserted key is removed first and reads
///   never reorder (LRU when configured)
/// - Hit/miss/eviction statistics
pub struct BoundedCache<K, V> {
    /// Name used in log lines
    name: &'static str,

    /// Maximum number of entries
    capacity: usize,

    policy: EvictionPolicy,

    /// Internal storage
    store: Arc<RwLock<CacheStore<K, V>>>,
}

/// Internal cache storage
struct CacheStore<K, V> {
    /// Main storage: key -> entry
    entries: HashMap<K, CacheEntry<V>>,

    /// Eviction order: front is evicted first
    order: VecDeque<K>,

    stats: CacheStats,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Clone,
{
    /// Create a new cache holding at most `capacity` entries
    pub fn new(name: &'static str, capacity: usize, policy: EvictionPolicy) -> Self {
        info!(
            "Initializing {} cache (capacity: {}, policy: {:?})",
            name, capacity, policy
        );

        let store = CacheStore {
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats::default(),
        };

        Self {
            name,
            capacity,
            policy,
            store: Arc::new(RwLock::new(store)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &K) -> Option<V> {
        let mut store = self.store.write().await;

        if let Some(entry) = store.entries.get_mut(key) {
            entry.mark_accessed();
            let value = entry.value.clone();
            let (served, age) = (entry.metadata.access_count, entry.age());
            store.stats.hits += 1;

            if self.policy == EvictionPolicy::Lru {
                Self::move_to_back(&mut store, key);
            }

            debug!(
                "[{}] Cache hit: {} (hit #{}, age {:.1}s)",
                self.name,
                key,
                served,
                age.as_secs_f64()
            );
            Some(value)
        } else {
            debug!("[{}] Cache miss: {}", self.name, key);
            store.stats.misses += 1;
            None
        }
    }

    /// Insert a value into the cache, evicting the front entry if full
    pub async fn insert(&self, key: K, value: V) {
        let mut store = self.store.write().await;

        if let Some(existing) = store.entries.get_mut(&key) {
            debug!("[{}] Replacing existing cache entry: {}", self.name, key);
            existing.replace(value);
            if self.policy == EvictionPolicy::Lru {
                Self::move_to_back(&mut store, &key);
            }
            return;
        }

        while store.entries.len() >= self.capacity {
            let Some(oldest) = store.order.pop_front() else {
                break;
            };
            store.entries.remove(&oldest);
            store.stats.evictions += 1;
            debug!("[{}] Evicted cache entry: {}", self.name, oldest);
        }

        debug!("[{}] Inserting new cache entry: {}", self.name, key);
        store.entries.insert(key.clone(), CacheEntry::new(value));
        store.order.push_back(key);
        store.stats.insertions += 1;
        store.stats.entries = store.entries.len();
    }

    /// Bookkeeping for `key` without counting a hit
    pub async fn metadata(&self, key: &K) -> Option<CacheMetadata> {
        let store = self.store.read().await;
        store.entries.get(key).map(|entry| entry.metadata.clone())
    }

    /// Check if a key exists in the cache (without counting a hit)
    pub async fn contains_key(&self, key: &K) -> bool {
        let store = self.store.read().await;
        store.entries.contains_key(key)
    }

    /// Remove a specific entry from the cache
    pub async fn remove(&self, key: &K) -> Option<V> {
        let mut store = self.store.write().await;

        let entry = store.entries.remove(key)?;
        store.order.retain(|k| k != key);
        store.stats.entries = store.entries.len();
        debug!("[{}] Removed cache entry: {}", self.name, key);
        Some(entry.value)
    }

    /// Clear all entries from the cache
    pub async fn clear(&self) {
        let mut store = self.store.write().await;

        let count = store.entries.len();
        store.entries.clear();
        store.order.clear();
        store.stats.entries = 0;

        info!("[{}] Cleared {} entries from cache", self.name, count);
    }

    /// Keys in eviction order (front is evicted next)
    pub async fn keys(&self) -> Vec<K> {
        let store = self.store.read().await;
        store.order.iter().cloned().collect()
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let store = self.store.read().await;
        store.stats.clone()
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

    fn move_to_back(store: &mut CacheStore<K, V>, key: &K) {
        if let Some(position) = store.order.iter().position(|k| k == key) {
            if let Some(k) = store.order.remove(position) {
                store.order.push_back(k);
            }
        }
    }
}
