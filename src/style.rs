//! Style token extraction and the generated stylesheet cache
//!
//! Stylesheet generation only depends on which utility classes a document
//! uses, so the cache is keyed by the token set rather than by the whole
//! document. Two documents that differ only in markup or logic share an
//! entry.

use crate::cache::{BoundedCache, CacheStats, ContentHash, StyleHash};
use crate::config::EvictionPolicy;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

static CLASS_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"className=(?:"([^"]+)"|'([^']+)')"#).expect("class attribute pattern is valid")
});

/// Collect the sorted, deduplicated class tokens used in `className` attributes
pub fn extract_tokens(source: &str) -> Vec<String> {
    let tokens: BTreeSet<&str> = CLASS_ATTRIBUTE
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .flat_map(|value| value.as_str().split_whitespace())
        .collect();

    tokens.into_iter().map(str::to_string).collect()
}

/// Hash a token list; ordering and repetition do not matter
pub fn hash_tokens<S: AsRef<str>>(tokens: &[S]) -> StyleHash {
    let unique: BTreeSet<&str> = tokens.iter().map(|token| token.as_ref()).collect();
    let joined = unique.into_iter().collect::<Vec<_>>().join(" ");
    ContentHash::from_text(&joined)
}

/// Generated stylesheets keyed by style token set
pub struct StyleCache {
    cache: BoundedCache<StyleHash, Arc<str>>,
}

impl StyleCache {
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            cache: BoundedCache::new("style", capacity, policy),
        }
    }

    pub async fn get(&self, hash: &StyleHash) -> Option<Arc<str>> {
        self.cache.get(hash).await
    }

    pub async fn insert(&self, hash: StyleHash, stylesheet: Arc<str>) {
        self.cache.insert(hash, stylesheet).await
    }

    pub async fn contains(&self, hash: &StyleHash) -> bool {
        self.cache.contains_key(hash).await
    }

    pub async fn len(&self) -> usize {
        self.cache.len().await
    }

    pub async fn clear(&self) {
        self.cache.clear().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
