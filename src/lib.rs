//! # Ouroboros Render (ouroboros-render)
//!
//! Caching and incremental build orchestration for rendering authored UI
//! component documents into markup.
//!
//! Bundling, module execution, rendering and stylesheet generation are done
//! by host-provided collaborators (see [`collab`]). This crate decides when
//! their work can be reused.
//!
//! ## Features
//!
//! - Build artifact cache keyed by document content
//! - Style cache keyed by the set of utility classes a document uses
//! - Render cache keyed by path, content, props and stylesheet
//! - Retained incremental build contexts, one per document path
//! - Bounded caches with FIFO eviction (LRU optional)
//! - Coalescing of concurrent requests for the same build or render
//! - Failures mapped back to the authored source through source maps
//!
//! ## Rendering a document
//!
//! ```no_run
//! use ouroboros_render::{Collaborators, Props, RenderConfig, RenderOrchestrator};
//!
//! async fn preview(collaborators: Collaborators) -> anyhow::Result<()> {
//!     let orchestrator = RenderOrchestrator::new(RenderConfig::from_env()?, collaborators)?;
//!
//!     let result = orchestrator
//!         .render_document_by_path("emails/welcome.tsx", Props::new())
//!         .await;
//!
//!     match result.into_result() {
//!         Ok(document) => println!("{}", document.markup),
//!         Err(error) => eprintln!("{}", error),
//!     }
//!
//!     println!("{}", orchestrator.stats().await);
//!     orchestrator.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod build;
pub mod cache;
pub mod collab;
pub mod config;
pub mod error;
pub mod props;
pub mod render;
pub mod sourcemap;
pub mod style;

// Re-export main types for convenience
pub use build::{BuildArtifact, BuildArtifactCache, BuildContextPool, BuiltDocument, DocumentBuilder};
pub use cache::{
    BoundedCache, CacheMetadata, CacheStats, ContentHash, DocumentHash, InFlight, PropsFingerprint, RenderCacheKey,
    StyleHash, StylesheetHash,
};
pub use collab::{
    BuildOptions, BuildOutput, BuildSession, BuiltModule, Bundler, Collaborators, DocumentComponent,
    ExecutionSandbox, LoadedDocument, ModuleContext, RenderFunction, StyleGenerator,
};
pub use config::{EvictionPolicy, RenderConfig, RenderConfigBuilder};
pub use error::{ErrorObject, RenderError, Result};
pub use props::{fingerprint_props, PropValue, Props};
pub use render::{
    DocumentRenderingResult, RenderCache, RenderCaches, RenderOrchestrator, RenderStats, RenderTiming,
    RenderedDocument,
};
pub use sourcemap::{ErrorSourceMapper, SourceMap};
pub use style::{extract_tokens, hash_tokens, StyleCache};
