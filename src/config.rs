//! Configuration for the render pipeline caches

use crate::error::{RenderError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Default bound for the build artifact cache
pub const MAX_BUILD: usize = 50;

/// Default bound for the generated stylesheet cache
pub const MAX_STYLE: usize = 50;

/// Default bound for the final render cache
pub const MAX_RENDER: usize = 100;

/// Order in which a full cache gives up entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Earliest inserted entry goes first; reads do not reorder
    #[default]
    Fifo,

    /// Least recently read or written entry goes first
    Lru,
}

impl FromStr for EvictionPolicy {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" => Ok(EvictionPolicy::Fifo),
            "lru" => Ok(EvictionPolicy::Lru),
            other => Err(RenderError::ConfigError(format!(
                "unknown eviction policy: {}",
                other
            ))),
        }
    }
}

/// Configuration for the render orchestrator and its caches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Maximum number of build artifacts kept, keyed by document content hash
    pub max_build_entries: usize,

    /// Maximum number of generated stylesheets kept, keyed by style token set
    pub max_style_entries: usize,

    /// Maximum number of rendered results kept
    pub max_render_entries: usize,

    /// Eviction order shared by all three bounded caches
    pub eviction_policy: EvictionPolicy,

    /// Let concurrent requests for the same key share one computation
    pub coalesce_requests: bool,

    /// Build contexts unused for this long may be released by `dispose_idle`
    pub context_idle_timeout: Option<Duration>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_build_entries: MAX_BUILD,
            max_style_entries: MAX_STYLE,
            max_render_entries: MAX_RENDER,
            eviction_policy: EvictionPolicy::Fifo,
            coalesce_requests: true,
            context_idle_timeout: None,
        }
    }
}

impl RenderConfig {
    /// Create a new builder for render configuration
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_build_entries == 0 {
            return Err("max_build_entries must be greater than 0".to_string().into());
        }

        if self.max_style_entries == 0 {
            return Err("max_style_entries must be greater than 0".to_string().into());
        }

        if self.max_render_entries == 0 {
            return Err("max_render_entries must be greater than 0".to_string().into());
        }

        if self.context_idle_timeout == Some(Duration::ZERO) {
            return Err("context_idle_timeout must be greater than 0".to_string().into());
        }

        Ok(())
    }

    /// Load configuration from the environment (and a `.env` file if present)
    ///
    /// Recognized variables:
    /// - `OUROBOROS_RENDER_MAX_BUILD_ENTRIES`
    /// - `OUROBOROS_RENDER_MAX_STYLE_ENTRIES`
    /// - `OUROBOROS_RENDER_MAX_RENDER_ENTRIES`
    /// - `OUROBOROS_RENDER_EVICTION` (`fifo` or `lru`)
    /// - `OUROBOROS_RENDER_COALESCE` (`true` or `false`)
    /// - `OUROBOROS_RENDER_CONTEXT_IDLE_SECS`
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(value) = lookup("OUROBOROS_RENDER_MAX_BUILD_ENTRIES") {
            builder = builder.max_build_entries(parse_var("OUROBOROS_RENDER_MAX_BUILD_ENTRIES", &value)?);
        }
        if let Some(value) = lookup("OUROBOROS_RENDER_MAX_STYLE_ENTRIES") {
            builder = builder.max_style_entries(parse_var("OUROBOROS_RENDER_MAX_STYLE_ENTRIES", &value)?);
        }
        if let Some(value) = lookup("OUROBOROS_RENDER_MAX_RENDER_ENTRIES") {
            builder = builder.max_render_entries(parse_var("OUROBOROS_RENDER_MAX_RENDER_ENTRIES", &value)?);
        }
        if let Some(value) = lookup("OUROBOROS_RENDER_EVICTION") {
            builder = builder.eviction_policy(value.parse()?);
        }
        if let Some(value) = lookup("OUROBOROS_RENDER_COALESCE") {
            builder = builder.coalesce_requests(parse_var("OUROBOROS_RENDER_COALESCE", &value)?);
        }
        if let Some(value) = lookup("OUROBOROS_RENDER_CONTEXT_IDLE_SECS") {
            let secs: u64 = parse_var("OUROBOROS_RENDER_CONTEXT_IDLE_SECS", &value)?;
            builder = builder.context_idle_timeout(Duration::from_secs(secs));
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RenderError::ConfigError(format!("invalid value for {}: {:?}", name, value)))
}

/// Builder for render configuration
#[derive(Debug, Default)]
pub struct RenderConfigBuilder {
    max_build_entries: Option<usize>,
    max_style_entries: Option<usize>,
    max_render_entries: Option<usize>,
    eviction_policy: Option<EvictionPolicy>,
    coalesce_requests: Option<bool>,
    context_idle_timeout: Option<Duration>,
}

impl RenderConfigBuilder {
    /// Set the build artifact cache bound
    pub fn max_build_entries(mut self, max: usize) -> Self {
        self.max_build_entries = Some(max);
        self
    }

    /// Set the stylesheet cache bound
    pub fn max_style_entries(mut self, max: usize) -> Self {
        self.max_style_entries = Some(max);
        self
    }

    /// Set the render cache bound
    pub fn max_render_entries(mut self, max: usize) -> Self {
        self.max_render_entries = Some(max);
        self
    }

    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }

    /// Enable or disable in-flight request coalescing
    pub fn coalesce_requests(mut self, enable: bool) -> Self {
        self.coalesce_requests = Some(enable);
        self
    }

    pub fn context_idle_timeout(mut self, timeout: Duration) -> Self {
        self.context_idle_timeout = Some(timeout);
        self
    }

    /// Build the render configuration
    pub fn build(self) -> RenderConfig {
        let defaults = RenderConfig::default();

        RenderConfig {
            max_build_entries: self.max_build_entries.unwrap_or(defaults.max_build_entries),
            max_style_entries: self.max_style_entries.unwrap_or(defaults.max_style_entries),
            max_render_entries: self.max_render_entries.unwrap_or(defaults.max_render_entries),
            eviction_policy: self.eviction_policy.unwrap_or(defaults.eviction_policy),
            coalesce_requests: self.coalesce_requests.unwrap_or(defaults.coalesce_requests),
            context_idle_timeout: self.context_idle_timeout.or(defaults.context_idle_timeout),
        }
    }
}

/// Preset configurations
impl RenderConfig {
    /// Configuration for memory-constrained environments
    pub fn small() -> Self {
        Self {
            max_build_entries: 10,
            max_style_entries: 10,
            max_render_entries: 20,
            context_idle_timeout: Some(Duration::from_secs(600)),
            ..Default::default()
        }
    }

    /// Configuration for long-running preview servers with many documents
    pub fn large() -> Self {
        Self {
            max_build_entries: 500,
            max_style_entries: 500,
            max_render_entries: 1_000,
            context_idle_timeout: Some(Duration::from_secs(3600)),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.max_build_entries, 50);
        assert_eq!(config.max_style_entries, 50);
        assert_eq!(config.max_render_entries, 100);
        assert_eq!(config.eviction_policy, EvictionPolicy::Fifo);
        assert!(config.coalesce_requests);
    }

    #[test]
    fn test_config_validation() {
        assert!(RenderConfig::default().validate().is_ok());

        let mut invalid = RenderConfig::default();
        invalid.max_render_entries = 0;
        assert!(invalid.validate().is_err());

        let invalid = RenderConfig::builder()
            .context_idle_timeout(Duration::ZERO)
            .build();
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = RenderConfig::builder()
            .max_build_entries(5)
            .eviction_policy(EvictionPolicy::Lru)
            .coalesce_requests(false)
            .build();

        assert_eq!(config.max_build_entries, 5);
        assert_eq!(config.max_style_entries, MAX_STYLE);
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert!(!config.coalesce_requests);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("OUROBOROS_RENDER_MAX_RENDER_ENTRIES", "7"),
            ("OUROBOROS_RENDER_EVICTION", "LRU"),
            ("OUROBOROS_RENDER_COALESCE", "false"),
            ("OUROBOROS_RENDER_CONTEXT_IDLE_SECS", "30"),
        ]
        .into_iter()
        .collect();

        let config = RenderConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.max_render_entries, 7);
        assert_eq!(config.max_build_entries, MAX_BUILD);
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert!(!config.coalesce_requests);
        assert_eq!(config.context_idle_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result = RenderConfig::from_lookup(|name| {
            (name == "OUROBOROS_RENDER_MAX_BUILD_ENTRIES").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(RenderError::ConfigError(_))));

        let result = RenderConfig::from_lookup(|name| {
            (name == "OUROBOROS_RENDER_MAX_STYLE_ENTRIES").then(|| "0".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_preset_configs() {
        assert_eq!(RenderConfig::small().max_render_entries, 20);
        assert_eq!(RenderConfig::large().max_build_entries, 500);
        assert!(RenderConfig::large().validate().is_ok());
    }
}
