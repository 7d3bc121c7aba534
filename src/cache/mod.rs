//! # Bounded Caching Layer
//!
//! Building blocks shared by the style, build-artifact and render caches.
//!
//! ## Features
//!
//! - **Bounded size**: every cache holds at most a configured number of entries
//! - **FIFO eviction**: the earliest inserted entry leaves first, independent of
//!   how often it is read (LRU available through configuration)
//! - **Content fingerprints**: XXH3-128 hashes that are stable across runs
//! - **Request coalescing**: concurrent misses for the same key share one computation
//! - **Metrics**: hit/miss/eviction counters per cache
//!
//! ## Example
//!
//! ```rust
//! use ouroboros_render::cache::BoundedCache;
//! use ouroboros_render::config::EvictionPolicy;
//!
//! # async fn example() {
//! let cache = BoundedCache::new("example", 2, EvictionPolicy::Fifo);
//!
//! cache.insert("a".to_string(), 1).await;
//! cache.insert("b".to_string(), 2).await;
//! cache.insert("c".to_string(), 3).await;
//!
//! // "a" was inserted first, so it was evicted
//! assert_eq!(cache.get(&"a".to_string()).await, None);
//! # }
//! ```

pub mod entry;
pub mod inflight;
pub mod store;
pub mod types;

pub use entry::{CacheEntry, CacheMetadata};
pub use inflight::InFlight;
pub use store::BoundedCache;
pub use types::{
    CacheStats, ContentHash, DocumentHash, PropsFingerprint, RenderCacheKey, StyleHash,
    StylesheetHash,
};
