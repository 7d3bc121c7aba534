//! Interfaces of the external collaborators
//!
//! The bundler, the module sandbox, the rendering runtime and the style
//! generator are provided by the host. This crate only decides when to call
//! them and what to reuse; every failure they report is an [`ErrorObject`].

use crate::error::ErrorObject;
use crate::props::Props;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What to bundle and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Entry document
    pub entry: PathBuf,

    /// Emit an external source map alongside the module
    pub source_map: bool,

    /// Compile-time `process.env.NODE_ENV` replacement
    pub node_env: String,
}

impl BuildOptions {
    pub fn for_document(entry: impl Into<PathBuf>) -> Self {
        Self {
            entry: entry.into(),
            source_map: true,
            node_env: "development".to_string(),
        }
    }
}

/// Output of one bundler run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    /// Executable module text
    pub module: String,

    /// Stylesheet emitted by the bundle itself (imported CSS), if any
    pub stylesheet: Option<String>,

    /// Source map JSON for `module`
    pub source_map: Option<String>,
}

/// Bundler able to open incremental build sessions
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Open a session for `options.entry`; nothing is built until `rebuild`
    async fn create_context(&self, options: &BuildOptions) -> Result<Box<dyn BuildSession>, ErrorObject>;
}

/// Retained bundler session for one entry document
#[async_trait]
pub trait BuildSession: Send {
    /// Build (first call) or incrementally rebuild the entry
    async fn rebuild(&mut self) -> Result<BuildOutput, ErrorObject>;

    /// Release the session's resources
    async fn dispose(&mut self);
}

/// Module environment fabricated for the sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleContext {
    pub filename: PathBuf,
    pub dirname: PathBuf,
}

impl ModuleContext {
    pub fn for_document(path: &Path) -> Self {
        Self {
            filename: path.to_path_buf(),
            dirname: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        }
    }
}

/// Built module handed to the sandbox
#[derive(Debug, Clone)]
pub struct BuiltModule<'a> {
    pub code: &'a str,
    pub document_path: &'a Path,
    pub source_map: Option<&'a str>,
}

/// Loads built modules in an isolated execution environment
#[async_trait]
pub trait ExecutionSandbox: Send + Sync {
    async fn load(&self, module: BuiltModule<'_>, context: &ModuleContext) -> Result<LoadedDocument, ErrorObject>;
}

/// A document component exported by a built module
pub trait DocumentComponent: Send + Sync {
    /// Declared default props used when the caller supplies none
    fn preview_props(&self) -> Props {
        Props::new()
    }
}

/// The rendering runtime's entry point exported alongside the component
#[async_trait]
pub trait RenderFunction: Send + Sync {
    async fn render(
        &self,
        component: &dyn DocumentComponent,
        props: &Props,
        stylesheet: Option<&str>,
    ) -> Result<String, ErrorObject>;
}

/// Result of loading a built module
#[derive(Clone)]
pub struct LoadedDocument {
    pub component: Arc<dyn DocumentComponent>,
    pub render_fn: Arc<dyn RenderFunction>,
}

impl fmt::Debug for LoadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedDocument").finish_non_exhaustive()
    }
}

/// Generates a stylesheet for a set of utility class tokens
#[async_trait]
pub trait StyleGenerator: Send + Sync {
    async fn generate(&self, tokens: &[String]) -> Result<String, ErrorObject>;
}

/// The set of collaborators the orchestrator is wired with
#[derive(Clone)]
pub struct Collaborators {
    pub bundler: Arc<dyn Bundler>,
    pub sandbox: Arc<dyn ExecutionSandbox>,
    pub styles: Arc<dyn StyleGenerator>,
}
