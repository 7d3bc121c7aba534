//! Integration tests for the build pipeline and failure handling
//!
//! Covers the artifact and style caches, the build context pool, and the
//! read/build/execution/render failure paths.

mod common;

use common::{props, Harness};
use ouroboros_render::{ContentHash, Props, RenderConfig, RenderError};
use serde_json::json;
use std::time::Duration;

const RECEIPT: &str = r#"export default function Receipt(props) {
  return <Doc className="p-4 text-sm">{props.title}</Doc>;
}"#;

const STATEMENT: &str = r#"export default function Statement(props) {
  return <main className="text-sm p-4"><p className='p-4'>{props.title} statement</p></main>;
}"#;

#[tokio::test]
async fn test_style_cache_shared_between_documents() {
    let harness = Harness::new();
    let receipt = harness.write("receipt.tsx", RECEIPT);
    let statement = harness.write("statement.tsx", STATEMENT);

    let a = harness.orchestrator.render(&receipt, Props::new()).await.unwrap();
    let b = harness.orchestrator.render(&statement, Props::new()).await.unwrap();

    assert_eq!(harness.calls.rebuilds(), 2);
    assert_eq!(harness.calls.style_generations(), 1);
    assert!(a.markup.contains(".p-4 {}\n.text-sm {}"));
    assert!(b.markup.contains(".p-4 {}\n.text-sm {}"));

    let stats = harness.orchestrator.stats().await;
    assert_eq!(stats.style.hits, 1);
    assert_eq!(stats.style.entries, 1);
    assert_eq!(stats.contexts, 2);
}

#[tokio::test]
async fn test_identical_content_shares_build_artifact() {
    let harness = Harness::new();
    let first = harness.write("first.tsx", RECEIPT);
    let copy = harness.write("copy.tsx", RECEIPT);

    harness.orchestrator.render(&first, Props::new()).await.unwrap();
    let rendered = harness.orchestrator.render(&copy, Props::new()).await.unwrap();

    // Same content hash: no second build, but a separate render entry per path
    assert_eq!(harness.calls.rebuilds(), 1);
    assert_eq!(harness.calls.renders(), 2);
    assert_eq!(rendered.react_markup, RECEIPT);
}

#[tokio::test]
async fn test_read_failure() {
    let harness = Harness::new();
    let missing = harness.dir.path().join("missing.tsx");

    let result = harness.orchestrator.render_document_by_path(&missing, Props::new()).await;

    assert!(result.is_error());
    let error = result.into_result().unwrap_err();
    assert!(error.name.contains("NotFound"));
    assert_eq!(harness.calls.rebuilds(), 0);
    assert_eq!(harness.calls.renders(), 0);
}

#[tokio::test]
async fn test_build_failure_is_not_cached() {
    let harness = Harness::new();
    let path = harness.write("receipt.tsx", "import './missing'\nexport default () => null;");

    for _ in 0..2 {
        match harness.orchestrator.render(&path, Props::new()).await {
            Err(RenderError::BuildFailure(error)) => {
                assert_eq!(error.name, "BuildFailure");
                assert!(error.message.contains("./missing"));
            }
            other => panic!("expected build failure, got {:?}", other.map(|doc| doc.markup.clone())),
        }
    }

    // Each attempt reached the bundler on the retained context
    assert_eq!(harness.calls.rebuilds(), 2);
    assert_eq!(harness.calls.contexts_created(), 1);
    assert_eq!(harness.calls.loads(), 0);
    assert!(harness.orchestrator.builder().artifacts().is_empty().await);
    assert_eq!(harness.orchestrator.builder().styles().len().await, 0);
}

#[tokio::test]
async fn test_build_failure_keeps_unrelated_artifact() {
    let harness = Harness::new();
    let path = harness.write("receipt.tsx", RECEIPT);
    harness.orchestrator.render(&path, Props::new()).await.unwrap();

    let good = ContentHash::from_text(RECEIPT);
    assert!(harness.orchestrator.builder().artifacts().contains(&good).await);

    // Break the same document
    harness.write("receipt.tsx", &format!("import './missing'\n{}", RECEIPT));
    let broken = harness.orchestrator.render_document_by_path(&path, Props::new()).await;
    assert!(broken.is_error());

    assert!(harness.orchestrator.builder().artifacts().contains(&good).await);
    assert_eq!(harness.orchestrator.builder().artifacts().len().await, 1);

    // Fix it: the previous artifact is served without a rebuild
    harness.write("receipt.tsx", RECEIPT);
    let fixed = harness.orchestrator.render(&path, Props::new()).await.unwrap();
    assert_eq!(harness.calls.rebuilds(), 2);
    assert_eq!(harness.calls.renders(), 1);
    assert!(fixed.markup.contains("<h1>Preview</h1>"));
}

#[tokio::test]
async fn test_execution_failure() {
    let harness = Harness::new();
    let path = harness.write("receipt.tsx", "throw on load\nexport default () => null;");

    match harness.orchestrator.render(&path, Props::new()).await {
        Err(RenderError::ExecutionFailure(error)) => {
            assert_eq!(error.name, "ReferenceError");
            assert_eq!(error.message, "module evaluation failed");
        }
        other => panic!("expected execution failure, got {:?}", other.map(|doc| doc.markup.clone())),
    }

    assert_eq!(harness.calls.loads(), 1);
    assert_eq!(harness.calls.renders(), 0);
    assert!(harness.orchestrator.builder().artifacts().is_empty().await);

    // Stylesheets generated for a failed build are not kept
    assert_eq!(harness.orchestrator.builder().styles().len().await, 0);
}

#[tokio::test]
async fn test_render_failure_is_source_mapped() {
    let harness = Harness::new();
    let path = harness.write("receipt.tsx", "throw on render\nexport default () => <Doc />;");

    let result = harness.orchestrator.render_document_by_path(&path, Props::new()).await;
    let error = result.into_result().unwrap_err();

    let location = format!("{}:7:5", path.display());
    assert_eq!(error.name, "TypeError");
    assert!(error.message.ends_with(&format!("(at {})", location)));

    let stack = error.stack.unwrap();
    assert!(stack.contains(&format!("at Doc ({})", location)));
    assert!(stack.contains("at renderToString (/virtual/runtime.js:10:3)"));

    // Failures are not cached; the next attempt renders again
    let again = harness.orchestrator.render(&path, Props::new()).await;
    assert!(matches!(again, Err(RenderError::RenderFailure(_))));
    assert_eq!(harness.calls.renders(), 2);
    assert_eq!(harness.calls.rebuilds(), 1);
    assert_eq!(harness.orchestrator.render_cache().len().await, 0);
}

#[tokio::test]
async fn test_error_result_shape() {
    let harness = Harness::new();
    let path = harness.write("receipt.tsx", "throw on render");

    let result = harness
        .orchestrator
        .render_document_by_path(&path, props(json!({"title": "x"})))
        .await;
    let value = serde_json::to_value(&result).unwrap();

    assert!(value.get("markup").is_none());
    assert_eq!(value["error"]["name"], json!("TypeError"));
}

#[tokio::test]
async fn test_clear_caches_keeps_contexts() {
    let harness = Harness::new();
    let path = harness.write("receipt.tsx", RECEIPT);

    harness.orchestrator.render(&path, Props::new()).await.unwrap();
    harness.orchestrator.clear_caches().await;
    harness.orchestrator.render(&path, Props::new()).await.unwrap();

    assert_eq!(harness.calls.rebuilds(), 2);
    assert_eq!(harness.calls.renders(), 2);
    assert_eq!(harness.calls.style_generations(), 2);
    assert_eq!(harness.calls.contexts_created(), 1);
}

#[tokio::test]
async fn test_shutdown_disposes_every_context() {
    let harness = Harness::new();
    for (name, source) in [("receipt.tsx", RECEIPT), ("statement.tsx", STATEMENT)] {
        let path = harness.write(name, source);
        harness.orchestrator.render(&path, Props::new()).await.unwrap();
    }

    assert_eq!(harness.orchestrator.stats().await.contexts, 2);
    harness.orchestrator.shutdown().await;

    assert_eq!(harness.calls.disposed(), 2);
    assert_eq!(harness.orchestrator.stats().await.contexts, 0);
}

#[tokio::test]
async fn test_dispose_idle_contexts() {
    let config = RenderConfig::builder()
        .context_idle_timeout(Duration::from_millis(10))
        .build();
    let harness = Harness::with_config(config);
    let path = harness.write("receipt.tsx", RECEIPT);

    harness.orchestrator.render(&path, Props::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(harness.orchestrator.dispose_idle_contexts().await, 1);
    assert_eq!(harness.calls.disposed(), 1);

    // A later edit opens a fresh context
    harness.write("receipt.tsx", STATEMENT);
    harness.orchestrator.render(&path, Props::new()).await.unwrap();
    assert_eq!(harness.calls.contexts_created(), 2);
}

#[tokio::test]
async fn test_dispose_idle_without_timeout_is_noop() {
    let harness = Harness::new();
    let path = harness.write("receipt.tsx", RECEIPT);
    harness.orchestrator.render(&path, Props::new()).await.unwrap();

    assert_eq!(harness.orchestrator.dispose_idle_contexts().await, 0);
    assert_eq!(harness.calls.disposed(), 0);
}

#[test]
fn test_invalid_config_is_rejected() {
    let calls = std::sync::Arc::new(common::Calls::default());
    let config = RenderConfig::builder().max_style_entries(0).build();

    let result = ouroboros_render::RenderOrchestrator::new(config, common::collaborators(&calls));
    assert!(matches!(result, Err(RenderError::ConfigError(_))));
}
