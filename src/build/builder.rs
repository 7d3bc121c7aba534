//! Turns a document path into a loaded, renderable artifact

use super::artifact::{BuildArtifact, BuildArtifactCache};
use super::context::BuildContextPool;
use crate::cache::{ContentHash, DocumentHash, InFlight};
use crate::collab::{BuildOptions, BuiltModule, Collaborators, ExecutionSandbox, ModuleContext, StyleGenerator};
use crate::error::{ErrorObject, RenderError, Result};
use crate::sourcemap::{ErrorSourceMapper, SourceMap};
use crate::style::{extract_tokens, hash_tokens, StyleCache};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Outcome of a successful build
#[derive(Debug, Clone)]
pub struct BuiltDocument {
    pub artifact: BuildArtifact,
    pub content_hash: DocumentHash,

    /// Served from the build artifact cache
    pub cache_hit: bool,

    pub elapsed: Duration,
}

/// Read a document's source text.
///
/// Invalid UTF-8 is replaced rather than rejected; the bundler reports
/// anything it cannot parse.
pub async fn read_source(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| RenderError::ReadFailure {
        path: path.to_path_buf(),
        error: ErrorObject::from(e),
    })?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Builds documents through the style cache, the context pool and the
/// artifact cache
#[derive(Clone)]
pub struct DocumentBuilder {
    inner: Arc<BuilderInner>,
}

struct BuilderInner {
    artifacts: Arc<BuildArtifactCache>,
    styles: Arc<StyleCache>,
    pool: Arc<BuildContextPool>,
    sandbox: Arc<dyn ExecutionSandbox>,
    generator: Arc<dyn StyleGenerator>,
    coalesce: bool,
    inflight: InFlight<DocumentHash, Result<BuildArtifact>>,
}

impl DocumentBuilder {
    pub fn new(
        artifacts: Arc<BuildArtifactCache>,
        styles: Arc<StyleCache>,
        pool: Arc<BuildContextPool>,
        collaborators: &Collaborators,
        coalesce: bool,
    ) -> Self {
        Self {
            inner: Arc::new(BuilderInner {
                artifacts,
                styles,
                pool,
                sandbox: Arc::clone(&collaborators.sandbox),
                generator: Arc::clone(&collaborators.styles),
                coalesce,
                inflight: InFlight::new("build"),
            }),
        }
    }

    /// Build the document at `path`.
    ///
    /// Unchanged content is served from the artifact cache without touching
    /// the bundler, the sandbox or the style generator. Failures are never
    /// cached.
    pub async fn build(&self, path: &Path) -> Result<BuiltDocument> {
        let start = Instant::now();
        let source = read_source(path).await?;
        let content_hash = ContentHash::from_text(&source);

        if let Some(artifact) = self.inner.artifacts.get(&content_hash).await {
            debug!("[build] Cache hit for {} ({})", path.display(), content_hash);
            return Ok(BuiltDocument {
                artifact,
                content_hash,
                cache_hit: true,
                elapsed: start.elapsed(),
            });
        }

        debug!("[build] Cache miss for {} ({})", path.display(), content_hash);

        let artifact = if self.inner.coalesce {
            let inner = Arc::clone(&self.inner);
            let owned: PathBuf = path.to_path_buf();
            self.inner
                .inflight
                .run(content_hash, move || async move {
                    inner.build_uncached(&owned, &source, content_hash).await
                })
                .await?
        } else {
            self.inner.build_uncached(path, &source, content_hash).await?
        };

        Ok(BuiltDocument {
            artifact,
            content_hash,
            cache_hit: false,
            elapsed: start.elapsed(),
        })
    }

    pub fn artifacts(&self) -> &BuildArtifactCache {
        &self.inner.artifacts
    }

    pub fn styles(&self) -> &StyleCache {
        &self.inner.styles
    }

    pub fn pool(&self) -> &BuildContextPool {
        &self.inner.pool
    }

    /// Number of builds currently shared between callers
    pub fn pending(&self) -> usize {
        self.inner.inflight.pending()
    }
}

impl BuilderInner {
    async fn build_uncached(&self, path: &Path, source: &str, content_hash: DocumentHash) -> Result<BuildArtifact> {
        let tokens = extract_tokens(source);
        let style_hash = hash_tokens(&tokens);
        let cached_styles = self.styles.get(&style_hash).await;

        let options = BuildOptions::for_document(path);
        let output = self.pool.build(path, &options).await.map_err(|e| {
            error!("[build] Build failed for {}: {}", path.display(), e);
            RenderError::BuildFailure(e)
        })?;

        let (generated, fresh) = match cached_styles {
            Some(css) => {
                debug!("[style] Cache hit for {} tokens ({})", tokens.len(), style_hash);
                (css, false)
            }
            None => {
                debug!("[style] Cache miss for {} tokens ({})", tokens.len(), style_hash);
                let css = self.generator.generate(&tokens).await.map_err(|e| {
                    error!("[style] Stylesheet generation failed for {}: {}", path.display(), e);
                    RenderError::BuildFailure(e)
                })?;
                (Arc::<str>::from(css), true)
            }
        };

        let source_map = output.source_map.as_deref().and_then(|json| match SourceMap::parse(json) {
            Ok(map) => Some(Arc::new(map)),
            Err(e) => {
                warn!("[build] Ignoring unreadable source map for {}: {}", path.display(), e);
                None
            }
        });

        let module = BuiltModule {
            code: &output.module,
            document_path: path,
            source_map: output.source_map.as_deref(),
        };
        let loaded = self
            .sandbox
            .load(module, &ModuleContext::for_document(path))
            .await
            .map_err(|e| {
                let enriched = ErrorSourceMapper::enrich(e, path, source_map.as_deref());
                error!("[build] Executing {} failed: {}", path.display(), enriched);
                RenderError::ExecutionFailure(enriched)
            })?;

        let stylesheet = join_stylesheets(output.stylesheet.as_deref(), &generated);
        let artifact = BuildArtifact::new(loaded, stylesheet, source_map);

        self.artifacts.insert(content_hash, artifact.clone()).await;
        if fresh {
            self.styles.insert(style_hash, generated).await;
        }

        Ok(artifact)
    }
}

/// Bundle CSS followed by generated CSS; `None` when both are empty
fn join_stylesheets(bundled: Option<&str>, generated: &str) -> Option<Arc<str>> {
    let parts: Vec<&str> = [bundled.unwrap_or_default(), generated]
        .into_iter()
        .filter(|css| !css.trim().is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(Arc::from(parts.join("\n")))
    }
}
