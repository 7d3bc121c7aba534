//! Document build pipeline
//!
//! - [`context`]: per-path incremental bundler sessions
//! - [`artifact`]: loaded build outputs keyed by document content
//! - [`builder`]: the pipeline tying them to the style cache and sandbox

pub mod artifact;
pub mod builder;
pub mod context;

pub use artifact::{BuildArtifact, BuildArtifactCache};
pub use builder::{read_source, BuiltDocument, DocumentBuilder};
pub use context::{BuildContext, BuildContextPool, ContextHandle};
