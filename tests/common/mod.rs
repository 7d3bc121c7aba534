//! Instrumented in-memory collaborators for integration tests
//!
//! Behavior is driven by markers in the document text:
//! - `import './missing'` makes the bundler fail
//! - `throw on load` makes the sandbox fail
//! - `throw on render` makes the render function fail at bundle line 42
//! - `slow` delays the bundler and the render function

#![allow(dead_code)]

use async_trait::async_trait;
use ouroboros_render::{
    BuildOptions, BuildOutput, BuildSession, BuiltModule, Bundler, Collaborators, DocumentComponent,
    ErrorObject, ExecutionSandbox, LoadedDocument, ModuleContext, PropValue, Props, RenderConfig,
    RenderFunction, RenderOrchestrator, StyleGenerator,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const SLOW: Duration = Duration::from_millis(50);

/// Source map sending bundle line 42 to original line 7, column 5
pub fn line_42_to_7(document: &Path) -> String {
    let source = document
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(
        r#"{{"version":3,"file":"bundle.js","sources":["{}"],"names":[],"mappings":"{}AAMI"}}"#,
        source,
        ";".repeat(41)
    )
}

/// Call counters shared by every mock
#[derive(Default)]
pub struct Calls {
    pub contexts_created: AtomicUsize,
    pub rebuilds: AtomicUsize,
    pub disposed: AtomicUsize,
    pub loads: AtomicUsize,
    pub renders: AtomicUsize,
    pub style_generations: AtomicUsize,
}

impl Calls {
    pub fn contexts_created(&self) -> usize {
        self.contexts_created.load(Ordering::SeqCst)
    }

    pub fn rebuilds(&self) -> usize {
        self.rebuilds.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn style_generations(&self) -> usize {
        self.style_generations.load(Ordering::SeqCst)
    }
}

pub struct MockBundler {
    calls: Arc<Calls>,
}

struct MockSession {
    entry: PathBuf,
    calls: Arc<Calls>,
}

#[async_trait]
impl Bundler for MockBundler {
    async fn create_context(&self, options: &BuildOptions) -> Result<Box<dyn BuildSession>, ErrorObject> {
        self.calls.contexts_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            entry: options.entry.clone(),
            calls: Arc::clone(&self.calls),
        }))
    }
}

#[async_trait]
impl BuildSession for MockSession {
    async fn rebuild(&mut self) -> Result<BuildOutput, ErrorObject> {
        self.calls.rebuilds.fetch_add(1, Ordering::SeqCst);
        let source = tokio::fs::read_to_string(&self.entry).await?;

        if source.contains("slow") {
            tokio::time::sleep(SLOW).await;
        }

        if source.contains("import './missing'") {
            return Err(ErrorObject::new("Could not resolve \"./missing\"")
                .with_name("BuildFailure")
                .with_stack(format!("    at {}:1:8", self.entry.display())));
        }

        Ok(BuildOutput {
            module: source,
            stylesheet: None,
            source_map: Some(line_42_to_7(&self.entry)),
        })
    }

    async fn dispose(&mut self) {
        self.calls.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockComponent {
    pub code: String,
    pub preview: Props,
}

impl DocumentComponent for MockComponent {
    fn preview_props(&self) -> Props {
        self.preview.clone()
    }
}

pub struct MockRenderFn {
    calls: Arc<Calls>,
    code: String,
}

#[async_trait]
impl RenderFunction for MockRenderFn {
    async fn render(
        &self,
        _component: &dyn DocumentComponent,
        props: &Props,
        stylesheet: Option<&str>,
    ) -> Result<String, ErrorObject> {
        self.calls.renders.fetch_add(1, Ordering::SeqCst);

        if self.code.contains("slow") {
            tokio::time::sleep(SLOW).await;
        }

        if self.code.contains("throw on render") {
            return Err(ErrorObject::new("Cannot read properties of undefined (reading 'total')")
                .with_name("TypeError")
                .with_stack(
                    "TypeError: Cannot read properties of undefined (reading 'total')\n    at Doc (/virtual/bundle.js:42:1)\n    at renderToString (/virtual/runtime.js:10:3)",
                ));
        }

        let title = props.get("title").and_then(PropValue::as_str).unwrap_or("untitled");
        Ok(format!(
            "<html><style>{}</style><h1>{}</h1><pre>{}</pre></html>",
            stylesheet.unwrap_or_default(),
            title,
            self.code
        ))
    }
}

pub struct MockSandbox {
    calls: Arc<Calls>,
}

#[async_trait]
impl ExecutionSandbox for MockSandbox {
    async fn load(&self, module: BuiltModule<'_>, context: &ModuleContext) -> Result<LoadedDocument, ErrorObject> {
        self.calls.loads.fetch_add(1, Ordering::SeqCst);
        assert_eq!(context.filename, module.document_path);

        if module.code.contains("throw on load") {
            return Err(ErrorObject::new("module evaluation failed").with_name("ReferenceError"));
        }

        let mut preview = Props::new();
        preview.insert("title".to_string(), PropValue::from("Preview"));

        Ok(LoadedDocument {
            component: Arc::new(MockComponent {
                code: module.code.to_string(),
                preview,
            }),
            render_fn: Arc::new(MockRenderFn {
                calls: Arc::clone(&self.calls),
                code: module.code.to_string(),
            }),
        })
    }
}

pub struct MockStyles {
    calls: Arc<Calls>,
}

#[async_trait]
impl StyleGenerator for MockStyles {
    async fn generate(&self, tokens: &[String]) -> Result<String, ErrorObject> {
        self.calls.style_generations.fetch_add(1, Ordering::SeqCst);
        Ok(tokens
            .iter()
            .map(|token| format!(".{} {{}}", token))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

pub fn collaborators(calls: &Arc<Calls>) -> Collaborators {
    Collaborators {
        bundler: Arc::new(MockBundler {
            calls: Arc::clone(calls),
        }),
        sandbox: Arc::new(MockSandbox {
            calls: Arc::clone(calls),
        }),
        styles: Arc::new(MockStyles {
            calls: Arc::clone(calls),
        }),
    }
}

/// Orchestrator over a temporary document directory
pub struct Harness {
    pub dir: TempDir,
    pub calls: Arc<Calls>,
    pub orchestrator: RenderOrchestrator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RenderConfig::default())
    }

    pub fn with_config(config: RenderConfig) -> Self {
        let calls = Arc::new(Calls::default());
        let orchestrator = RenderOrchestrator::new(config, collaborators(&calls)).unwrap();
        Self {
            dir: tempfile::tempdir().unwrap(),
            calls,
            orchestrator,
        }
    }

    /// Write (or overwrite) a document and return its path
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}

pub fn props(value: serde_json::Value) -> Props {
    ouroboros_render::props::props_from_json(value)
}
