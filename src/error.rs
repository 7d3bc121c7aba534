//! Error types for document rendering
//!
//! Every failure that crosses a component boundary is normalized into an
//! [`ErrorObject`] (`message`, `stack`, `name`, `cause`). [`RenderError`]
//! classifies where in the pipeline the failure happened.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Normalized failure record shared by all collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Human readable message
    pub message: String,

    /// Stack trace, possibly rewritten to original source coordinates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    /// Error class name (e.g. `TypeError`, `BuildFailure`)
    pub name: String,

    /// Underlying failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorObject>>,
}

impl ErrorObject {
    /// Create an error record with the generic `Error` name
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            name: "Error".to_string(),
            cause: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_cause(mut self, cause: ErrorObject) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for ErrorObject {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for ErrorObject {
    fn from(err: std::io::Error) -> Self {
        ErrorObject::new(err.to_string()).with_name(format!("IoError({:?})", err.kind()))
    }
}

impl From<serde_json::Error> for ErrorObject {
    fn from(err: serde_json::Error) -> Self {
        ErrorObject::new(err.to_string()).with_name("SerializationError")
    }
}

/// Main error type for the render pipeline
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    /// Document source is missing or unreadable
    #[error("Failed to read document {}: {error}", path.display())]
    ReadFailure { path: PathBuf, error: ErrorObject },

    /// Bundler (or style generation) rejected the document or a dependency
    #[error("Build failed: {0}")]
    BuildFailure(ErrorObject),

    /// Built module raised while being loaded
    #[error("Execution failed: {0}")]
    ExecutionFailure(ErrorObject),

    /// Render function raised during invocation
    #[error("Render failed: {0}")]
    RenderFailure(ErrorObject),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RenderError {
    /// The normalized failure record for this error
    pub fn error_object(&self) -> ErrorObject {
        match self {
            RenderError::ReadFailure { error, .. }
            | RenderError::BuildFailure(error)
            | RenderError::ExecutionFailure(error)
            | RenderError::RenderFailure(error) => error.clone(),
            RenderError::ConfigError(message) => {
                ErrorObject::new(message.clone()).with_name("ConfigError")
            }
        }
    }

    /// Consume the error, keeping only the normalized record
    pub fn into_error_object(self) -> ErrorObject {
        match self {
            RenderError::ReadFailure { error, .. }
            | RenderError::BuildFailure(error)
            | RenderError::ExecutionFailure(error)
            | RenderError::RenderFailure(error) => error,
            RenderError::ConfigError(message) => {
                ErrorObject::new(message).with_name("ConfigError")
            }
        }
    }
}

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, RenderError>;

impl From<String> for RenderError {
    fn from(s: String) -> Self {
        RenderError::ConfigError(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RenderError::BuildFailure(
            ErrorObject::new("Could not resolve \"./missing\"").with_name("BuildFailure"),
        );
        assert_eq!(
            error.to_string(),
            "Build failed: BuildFailure: Could not resolve \"./missing\""
        );

        let read = RenderError::ReadFailure {
            path: PathBuf::from("/docs/missing.tsx"),
            error: ErrorObject::new("No such file"),
        };
        assert!(read.to_string().contains("/docs/missing.tsx"));
    }

    #[test]
    fn test_error_object_normalization() {
        let error = RenderError::ConfigError("max_render_entries must be greater than 0".into());
        let object = error.into_error_object();
        assert_eq!(object.name, "ConfigError");
        assert!(object.stack.is_none());

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let object = ErrorObject::from(io);
        assert_eq!(object.message, "gone");
        assert!(object.name.contains("NotFound"));
    }

    #[test]
    fn test_error_object_serialization_shape() {
        let object = ErrorObject::new("boom")
            .with_name("TypeError")
            .with_cause(ErrorObject::new("inner"));
        let json = serde_json::to_value(&object).unwrap();

        assert_eq!(json["message"], "boom");
        assert_eq!(json["name"], "TypeError");
        assert_eq!(json["cause"]["message"], "inner");
        assert!(json.get("stack").is_none());
    }
}
