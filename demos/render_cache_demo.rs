//! Render Cache Demo
//!
//! Renders a document several times with pass-through collaborators and
//! shows which renders are served from cache.
//!
//! Usage:
//!   cargo run --example render_cache_demo
//!
//! Environment variables (or a `.env` file):
//!   OUROBOROS_RENDER_MAX_RENDER_ENTRIES - render cache bound (default: 100)
//!   OUROBOROS_RENDER_EVICTION           - fifo or lru (default: fifo)
//!   RUST_LOG                            - log filter (default: info)

use async_trait::async_trait;
use ouroboros_render::props::props_from_json;
use ouroboros_render::{
    BuildOptions, BuildOutput, BuildSession, BuiltModule, Bundler, Collaborators, DocumentComponent,
    ErrorObject, ExecutionSandbox, LoadedDocument, ModuleContext, PropValue, Props, RenderConfig,
    RenderFunction, RenderOrchestrator, StyleGenerator,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// "Bundles" by reading the entry as-is
struct PassThroughBundler;

struct PassThroughSession {
    entry: PathBuf,
}

#[async_trait]
impl Bundler for PassThroughBundler {
    async fn create_context(&self, options: &BuildOptions) -> Result<Box<dyn BuildSession>, ErrorObject> {
        Ok(Box::new(PassThroughSession {
            entry: options.entry.clone(),
        }))
    }
}

#[async_trait]
impl BuildSession for PassThroughSession {
    async fn rebuild(&mut self) -> Result<BuildOutput, ErrorObject> {
        let module = tokio::fs::read_to_string(&self.entry).await?;
        Ok(BuildOutput {
            module,
            ..Default::default()
        })
    }

    async fn dispose(&mut self) {}
}

struct Template {
    preview: Props,
}

impl DocumentComponent for Template {
    fn preview_props(&self) -> Props {
        self.preview.clone()
    }
}

/// Replaces `{name}` placeholders with string props
struct Substitute {
    template: String,
}

#[async_trait]
impl RenderFunction for Substitute {
    async fn render(
        &self,
        _component: &dyn DocumentComponent,
        props: &Props,
        stylesheet: Option<&str>,
    ) -> Result<String, ErrorObject> {
        let mut markup = self.template.clone();
        for (name, value) in props {
            if let Some(text) = value.as_str() {
                markup = markup.replace(&format!("{{{}}}", name), text);
            }
        }
        Ok(format!("<style>{}</style>{}", stylesheet.unwrap_or_default(), markup))
    }
}

struct TemplateSandbox;

#[async_trait]
impl ExecutionSandbox for TemplateSandbox {
    async fn load(&self, module: BuiltModule<'_>, _context: &ModuleContext) -> Result<LoadedDocument, ErrorObject> {
        let mut preview = Props::new();
        preview.insert("name".to_string(), PropValue::from("reader"));

        Ok(LoadedDocument {
            component: Arc::new(Template { preview }),
            render_fn: Arc::new(Substitute {
                template: module.code.to_string(),
            }),
        })
    }
}

struct UtilityStyles;

#[async_trait]
impl StyleGenerator for UtilityStyles {
    async fn generate(&self, tokens: &[String]) -> Result<String, ErrorObject> {
        Ok(tokens.iter().map(|t| format!(".{} {{}}", t)).collect::<Vec<_>>().join(" "))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("=== Render Cache Demo ===");

    let config = RenderConfig::from_env()?;
    info!("Configuration: {:?}", config);

    let collaborators = Collaborators {
        bundler: Arc::new(PassThroughBundler),
        sandbox: Arc::new(TemplateSandbox),
        styles: Arc::new(UtilityStyles),
    };
    let orchestrator = RenderOrchestrator::new(config, collaborators)?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("welcome.tsx");
    tokio::fs::write(&path, r#"<Doc className="p-4 text-lg">Hello, {name}!</Doc>"#).await?;

    info!("\n--- First render (cold build) ---");
    let first = orchestrator.render(&path, Props::new()).await?;
    info!("Markup: {}", first.markup);

    info!("\n--- Same document, same props ---");
    let second = orchestrator.render(&path, Props::new()).await?;
    info!("Served from cache: {}", Arc::ptr_eq(&first, &second));

    info!("\n--- New props ---");
    let custom = orchestrator
        .render(&path, props_from_json(json!({"name": "Ada"})))
        .await?;
    info!("Markup: {}", custom.markup);

    info!("\n--- Edited document (incremental rebuild) ---");
    tokio::fs::write(&path, r#"<Doc className="p-4 text-lg">Welcome back, {name}.</Doc>"#).await?;
    let edited = orchestrator.render(&path, Props::new()).await?;
    info!("Markup: {}", edited.markup);

    info!("\n--- Missing document ---");
    let missing = orchestrator
        .render_document_by_path(dir.path().join("missing.tsx"), Props::new())
        .await;
    info!("Result: {}", serde_json::to_string(&missing)?);

    info!("\n--- Cache statistics ---");
    info!("\n{}", orchestrator.stats().await);

    orchestrator.shutdown().await;
    info!("\n=== Demo Complete ===");

    Ok(())
}
