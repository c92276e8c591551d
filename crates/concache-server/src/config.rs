//! Server configuration: defaults, `concache-server.toml`, then
//! `CONCACHE_*` environment variables, layered with `figment`.

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading or validating [`ServerConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Top-level server configuration: where to bind, plus the cache's own
/// starting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cache: CacheSection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cache: CacheSection::default(),
        }
    }
}

/// The cache's starting configuration, mirroring
/// [`concache_core::CacheConfig`] in a form `figment`/TOML can represent
/// (`concache_core` itself never depends on `figment`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub maxsize: Option<usize>,
    pub default_ttl_secs: Option<u64>,
    pub batch_window_ms: u64,
    pub max_batch_size: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            maxsize: Some(128),
            default_ttl_secs: None,
            batch_window_ms: 5,
            max_batch_size: 100,
        }
    }
}

impl ServerConfig {
    /// Loads configuration layering defaults, an optional
    /// `concache-server.toml`, then `CONCACHE_`-prefixed env vars.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or environment overrides fail to parse.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("concache-server.toml")
    }

    /// Loads configuration from a specific file path, which need not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CONCACHE_").split("__"));

        figment.extract().map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache.max_batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl From<&CacheSection> for concache_core::CacheConfig {
    fn from(section: &CacheSection) -> Self {
        concache_core::CacheConfig::default()
            .with_maxsize(section.maxsize.and_then(std::num::NonZeroUsize::new))
            .with_default_ttl(section.default_ttl_secs.map(std::time::Duration::from_secs))
            .with_batch(
                std::time::Duration::from_millis(section.batch_window_ms),
                std::num::NonZeroUsize::new(section.max_batch_size)
                    .unwrap_or_else(|| std::num::NonZeroUsize::new(100).expect("100 is non-zero")),
            )
    }
}
