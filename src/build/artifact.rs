//! Build artifacts keyed by document content

use crate::cache::{BoundedCache, CacheMetadata, CacheStats, DocumentHash};
use crate::collab::{DocumentComponent, LoadedDocument, RenderFunction};
use crate::config::EvictionPolicy;
use crate::sourcemap::SourceMap;
use std::fmt;
use std::sync::Arc;

/// Everything needed to render one document's content
#[derive(Clone)]
pub struct BuildArtifact {
    pub component: Arc<dyn DocumentComponent>,
    pub render_fn: Arc<dyn RenderFunction>,

    /// Resolved stylesheet (bundle CSS plus generated utility CSS)
    pub stylesheet: Option<Arc<str>>,

    /// Mapping from the bundled module back to the authored document
    pub source_map: Option<Arc<SourceMap>>,
}

impl BuildArtifact {
    pub fn new(loaded: LoadedDocument, stylesheet: Option<Arc<str>>, source_map: Option<Arc<SourceMap>>) -> Self {
        Self {
            component: loaded.component,
            render_fn: loaded.render_fn,
            stylesheet,
            source_map,
        }
    }

    pub fn stylesheet(&self) -> Option<&str> {
        self.stylesheet.as_deref()
    }
}

impl fmt::Debug for BuildArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildArtifact")
            .field("stylesheet_len", &self.stylesheet.as_ref().map(|css| css.len()))
            .field("has_source_map", &self.source_map.is_some())
            .finish_non_exhaustive()
    }
}

/// Bounded cache of build artifacts keyed by document content hash.
///
/// Only successful builds are stored; a failed build leaves every entry,
/// including entries for other content of the same path, untouched.
pub struct BuildArtifactCache {
    cache: BoundedCache<DocumentHash, BuildArtifact>,
}

impl BuildArtifactCache {
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            cache: BoundedCache::new("build", capacity, policy),
        }
    }

    pub async fn get(&self, hash: &DocumentHash) -> Option<BuildArtifact> {
        self.cache.get(hash).await
    }

    pub async fn insert(&self, hash: DocumentHash, artifact: BuildArtifact) {
        self.cache.insert(hash, artifact).await
    }

    pub async fn contains(&self, hash: &DocumentHash) -> bool {
        self.cache.contains_key(hash).await
    }

    /// Insertion time, hit count and version of an entry
    pub async fn metadata(&self, hash: &DocumentHash) -> Option<CacheMetadata> {
        self.cache.metadata(hash).await
    }

    pub async fn len(&self) -> usize {
        self.cache.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.is_empty().await
    }

    pub async fn clear(&self) {
        self.cache.clear().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
