//! Cache entry bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A cached value with its metadata.
///
/// Values are never mutated in place; a re-insert under the same key
/// replaces the value and bumps `version`.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V) -> Self {
        let now = Utc::now();

        Self {
            value,
            metadata: CacheMetadata {
                inserted_at: now,
                accessed_at: now,
                access_count: 0,
                version: 1,
            },
        }
    }

    /// Mark the entry as accessed (updates access time and count)
    pub fn mark_accessed(&mut self) {
        self.metadata.accessed_at = Utc::now();
        self.metadata.access_count += 1;
    }

    /// Swap in a new value, keeping the insertion time
    pub fn replace(&mut self, value: V) {
        self.value = value;
        self.metadata.accessed_at = Utc::now();
        self.metadata.version += 1;
    }

    /// Get the age of the entry
    pub fn age(&self) -> Duration {
        (Utc::now() - self.metadata.inserted_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the key was first stored
    pub inserted_at: DateTime<Utc>,

    /// Last read or write
    pub accessed_at: DateTime<Utc>,

    /// Number of cache hits served by this entry
    pub access_count: u64,

    /// Incremented each time the value is replaced
    pub version: u64,
}
