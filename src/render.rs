//! Render cache and the top-level render entry point
//!
//! A render first builds the document (served from the artifact cache when
//! the content is unchanged), then resolves props and derives a
//! [`RenderCacheKey`] from the path, the content hash, the props
//! fingerprint and the resolved stylesheet. A hit returns the stored result
//! untouched; a miss invokes the render function and stores the outcome.
//! Failures are never stored.

use crate::build::{read_source, BuildArtifact, BuildArtifactCache, BuildContextPool, DocumentBuilder};
use crate::cache::{BoundedCache, CacheMetadata, CacheStats, InFlight, RenderCacheKey, StylesheetHash};
use crate::collab::Collaborators;
use crate::config::{EvictionPolicy, RenderConfig};
use crate::error::{ErrorObject, RenderError, Result};
use crate::props::{fingerprint_props, Props};
use crate::sourcemap::ErrorSourceMapper;
use crate::style::StyleCache;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Elapsed time per render phase, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderTiming {
    pub total: f64,

    /// Building and loading the component
    pub component_load: f64,

    /// Invoking the render function
    pub rendering: f64,

    /// Re-reading the document source for the result
    pub file_read: f64,
}

/// A successfully rendered document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedDocument {
    /// Final markup produced by the render function
    pub markup: String,

    /// Raw document source, for consumers that diff or edit it
    pub react_markup: String,

    /// The component's declared default props. Entries that cannot be
    /// serialized (functions, cyclic values) are omitted from the output.
    #[serde(serialize_with = "serialize_preview_props")]
    pub preview_props: Props,

    pub timing: RenderTiming,
}

fn serialize_preview_props<S: Serializer>(props: &Props, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let mut out = serializer.serialize_map(None)?;
    for (name, value) in props {
        match serde_json::to_value(value) {
            Ok(json) => out.serialize_entry(name, &json)?,
            Err(e) => debug!("Omitting preview prop {}: {}", name, e),
        }
    }
    out.end()
}

/// Result of [`RenderOrchestrator::render_document_by_path`]: the rendered
/// document, or `{ "error": ... }`
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DocumentRenderingResult {
    Rendered(Arc<RenderedDocument>),
    Failed { error: ErrorObject },
}

impl DocumentRenderingResult {
    pub fn is_error(&self) -> bool {
        matches!(self, DocumentRenderingResult::Failed { .. })
    }

    pub fn into_result(self) -> std::result::Result<Arc<RenderedDocument>, ErrorObject> {
        match self {
            DocumentRenderingResult::Rendered(document) => Ok(document),
            DocumentRenderingResult::Failed { error } => Err(error),
        }
    }
}

impl From<Result<Arc<RenderedDocument>>> for DocumentRenderingResult {
    fn from(result: Result<Arc<RenderedDocument>>) -> Self {
        match result {
            Ok(document) => DocumentRenderingResult::Rendered(document),
            Err(e) => DocumentRenderingResult::Failed {
                error: e.into_error_object(),
            },
        }
    }
}

/// Final rendered results keyed by [`RenderCacheKey`]
pub struct RenderCache {
    cache: BoundedCache<RenderCacheKey, Arc<RenderedDocument>>,
}

impl RenderCache {
    pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self {
            cache: BoundedCache::new("render", capacity, policy),
        }
    }

    pub async fn get(&self, key: &RenderCacheKey) -> Option<Arc<RenderedDocument>> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: RenderCacheKey, document: Arc<RenderedDocument>) {
        self.cache.insert(key, document).await
    }

    pub async fn contains(&self, key: &RenderCacheKey) -> bool {
        self.cache.contains_key(key).await
    }

    pub async fn keys(&self) -> Vec<RenderCacheKey> {
        self.cache.keys().await
    }

    /// Insertion time, hit count and version of an entry
    pub async fn metadata(&self, key: &RenderCacheKey) -> Option<CacheMetadata> {
        self.cache.metadata(key).await
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

/// The caches and the context pool a render orchestrator works with.
///
/// Constructed once at startup and handed to the orchestrator; nothing is
/// held in process-wide statics.
#[derive(Clone)]
pub struct RenderCaches {
    pub artifacts: Arc<BuildArtifactCache>,
    pub styles: Arc<StyleCache>,
    pub renders: Arc<RenderCache>,
    pub contexts: Arc<BuildContextPool>,
}

impl RenderCaches {
    pub fn new(config: &RenderConfig, collaborators: &Collaborators) -> Self {
        let policy = config.eviction_policy;
        Self {
            artifacts: Arc::new(BuildArtifactCache::new(config.max_build_entries, policy)),
            styles: Arc::new(StyleCache::new(config.max_style_entries, policy)),
            renders: Arc::new(RenderCache::new(config.max_render_entries, policy)),
            contexts: Arc::new(BuildContextPool::new(Arc::clone(&collaborators.bundler))),
        }
    }
}

/// Statistics for every cache tier
#[derive(Debug, Clone, Serialize)]
pub struct RenderStats {
    pub build: CacheStats,
    pub style: CacheStats,
    pub render: CacheStats,

    /// Retained build contexts
    pub contexts: usize,
}

impl fmt::Display for RenderStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "build:  {}", self.build)?;
        writeln!(f, "style:  {}", self.style)?;
        writeln!(f, "render: {}", self.render)?;
        write!(f, "contexts: {}", self.contexts)
    }
}

/// Top-level entry point: build, render and cache documents
#[derive(Clone)]
pub struct RenderOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    config: RenderConfig,
    builder: DocumentBuilder,
    renders: Arc<RenderCache>,
    contexts: Arc<BuildContextPool>,
    inflight: InFlight<RenderCacheKey, Result<Arc<RenderedDocument>>>,
}

/// Per-render state carried from the build into the render function call
struct RenderJob {
    path: PathBuf,
    artifact: BuildArtifact,
    props: Props,
    preview_props: Props,
    key: RenderCacheKey,
    component_load: Duration,
    started: Instant,
}

impl RenderOrchestrator {
    /// Create an orchestrator with fresh caches sized by `config`
    pub fn new(config: RenderConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let caches = RenderCaches::new(&config, &collaborators);
        Ok(Self::with_caches(config, caches, collaborators))
    }

    /// Create an orchestrator over caches constructed by the caller
    pub fn with_caches(config: RenderConfig, caches: RenderCaches, collaborators: Collaborators) -> Self {
        let builder = DocumentBuilder::new(
            caches.artifacts,
            caches.styles,
            Arc::clone(&caches.contexts),
            &collaborators,
            config.coalesce_requests,
        );

        Self {
            inner: Arc::new(OrchestratorInner {
                config,
                builder,
                renders: caches.renders,
                contexts: caches.contexts,
                inflight: InFlight::new("render"),
            }),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.inner.config
    }

    pub fn builder(&self) -> &DocumentBuilder {
        &self.inner.builder
    }

    pub fn render_cache(&self) -> &RenderCache {
        &self.inner.renders
    }

    /// Render the document at `path`.
    ///
    /// Empty `props` means "use the component's declared preview props".
    pub async fn render(&self, path: impl AsRef<Path>, props: Props) -> Result<Arc<RenderedDocument>> {
        let path = path.as_ref();
        let started = Instant::now();

        let built = self.inner.builder.build(path).await?;
        let artifact = built.artifact;

        let preview_props = artifact.component.preview_props();
        let props = if props.is_empty() { preview_props.clone() } else { props };

        let key = RenderCacheKey::new(
            path,
            built.content_hash,
            fingerprint_props(&props),
            StylesheetHash::of(artifact.stylesheet()),
        );

        if !key.is_cacheable() {
            debug!("[render] Props not cacheable, bypassing render cache for {}", path.display());
        } else if let Some(document) = self.inner.renders.get(&key).await {
            debug!("[render] Cache hit: {}", key);
            info!(
                "Document {} rendered in {} (cached)",
                display_name(path),
                format_elapsed(started.elapsed())
            );
            return Ok(document);
        } else {
            debug!("[render] Cache miss: {}", key);
        }

        let job = RenderJob {
            path: path.to_path_buf(),
            artifact,
            props,
            preview_props,
            key: key.clone(),
            component_load: built.elapsed,
            started,
        };

        if self.inner.config.coalesce_requests && key.is_cacheable() {
            let inner = Arc::clone(&self.inner);
            self.inner
                .inflight
                .run(key, move || async move { inner.render_uncached(job).await })
                .await
        } else {
            self.inner.render_uncached(job).await
        }
    }

    /// Render and fold any failure into the `{ error }` result shape
    pub async fn render_document_by_path(&self, path: impl AsRef<Path>, props: Props) -> DocumentRenderingResult {
        self.render(path, props).await.into()
    }

    pub async fn stats(&self) -> RenderStats {
        RenderStats {
            build: self.inner.builder.artifacts().stats().await,
            style: self.inner.builder.styles().stats().await,
            render: self.inner.renders.stats().await,
            contexts: self.inner.contexts.len().await,
        }
    }

    /// Drop every cached artifact, stylesheet and render; contexts are kept
    pub async fn clear_caches(&self) {
        self.inner.builder.artifacts().clear().await;
        self.inner.builder.styles().clear().await;
        self.inner.renders.clear().await;
        info!("Cleared render caches");
    }

    /// Release build contexts idle longer than the configured timeout
    pub async fn dispose_idle_contexts(&self) -> usize {
        match self.inner.config.context_idle_timeout {
            Some(timeout) => self.inner.contexts.dispose_idle(timeout).await,
            None => 0,
        }
    }

    /// Dispose every build context; call once at process shutdown
    pub async fn shutdown(&self) {
        self.inner.contexts.dispose_all().await
    }
}

impl OrchestratorInner {
    async fn render_uncached(&self, job: RenderJob) -> Result<Arc<RenderedDocument>> {
        let RenderJob {
            path,
            artifact,
            props,
            preview_props,
            key,
            component_load,
            started,
        } = job;

        let render_start = Instant::now();
        let markup = artifact
            .render_fn
            .render(artifact.component.as_ref(), &props, artifact.stylesheet())
            .await
            .map_err(|e| {
                let enriched = ErrorSourceMapper::enrich(e, &path, artifact.source_map.as_deref());
                error!("[render] Rendering {} failed: {}", path.display(), enriched);
                RenderError::RenderFailure(enriched)
            })?;
        let rendering = render_start.elapsed();

        let read_start = Instant::now();
        let react_markup = read_source(&path).await?;
        let file_read = read_start.elapsed();

        let total = started.elapsed();
        let document = Arc::new(RenderedDocument {
            markup,
            react_markup,
            preview_props,
            timing: RenderTiming {
                total: millis(total),
                component_load: millis(component_load),
                rendering: millis(rendering),
                file_read: millis(file_read),
            },
        });

        if key.is_cacheable() {
            self.renders.insert(key, Arc::clone(&document)).await;
        }

        info!("Document {} rendered in {}", display_name(&path), format_elapsed(total));
        Ok(document)
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// `12.34ms` below one second, `1.23s` above
fn format_elapsed(duration: Duration) -> String {
    let ms = millis(duration);
    if ms < 1000.0 {
        format!("{:.2}ms", ms)
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
