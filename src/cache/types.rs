//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A 128-bit content fingerprint computed with XXH3.
///
/// Stable across runs for identical input. Two inputs with the same
/// `ContentHash` are assumed to be identical.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Hash a byte slice
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Hash UTF-8 text
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// Fingerprint of a document's raw source text
pub type DocumentHash = ContentHash;

/// Fingerprint of a sorted, deduplicated style token list
pub type StyleHash = ContentHash;

/// Fingerprint of the render input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropsFingerprint {
    /// Deterministic hash of the canonical serialization
    Hash(ContentHash),

    /// The props could not be serialized; the render bypasses the cache
    NonCacheable,
}

impl PropsFingerprint {
    pub fn is_cacheable(&self) -> bool {
        matches!(self, PropsFingerprint::Hash(_))
    }
}

impl fmt::Display for PropsFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropsFingerprint::Hash(hash) => write!(f, "{}", hash),
            PropsFingerprint::NonCacheable => write!(f, "no-props"),
        }
    }
}

/// Fingerprint of the stylesheet resolved for a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StylesheetHash {
    Hash(ContentHash),
    NoStylesheet,
}

impl StylesheetHash {
    pub fn of(stylesheet: Option<&str>) -> Self {
        match stylesheet {
            Some(css) => StylesheetHash::Hash(ContentHash::from_text(css)),
            None => StylesheetHash::NoStylesheet,
        }
    }
}

impl fmt::Display for StylesheetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StylesheetHash::Hash(hash) => write!(f, "{}", hash),
            StylesheetHash::NoStylesheet => write!(f, "no-css"),
        }
    }
}

/// Key for a final rendered result.
///
/// Any change to the document text, the render input or the resolved
/// stylesheet changes the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderCacheKey {
    pub document_path: PathBuf,
    pub content_hash: DocumentHash,
    pub props: PropsFingerprint,
    pub stylesheet: StylesheetHash,
}

impl RenderCacheKey {
    pub fn new(
        document_path: impl Into<PathBuf>,
        content_hash: DocumentHash,
        props: PropsFingerprint,
        stylesheet: StylesheetHash,
    ) -> Self {
        Self {
            document_path: document_path.into(),
            content_hash,
            props,
            stylesheet,
        }
    }

    /// Keys with non-cacheable props must never be looked up or stored
    pub fn is_cacheable(&self) -> bool {
        self.props.is_cacheable()
    }
}

impl fmt::Display for RenderCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.document_path.display(),
            self.content_hash,
            self.props,
            self.stylesheet
        )
    }
}

/// Statistics for a single bounded cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses
    pub misses: u64,

    /// Number of entries currently in cache
    pub entries: usize,

    /// Number of new keys stored
    pub insertions: u64,

    /// Number of entries removed to respect the bound
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, evictions: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.evictions
        )
    }
}
