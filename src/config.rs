//! JSON configuration, loaded with precedence: environment variables >
//! local `./.berkshelf/config.json` > `./config.json` > user
//! `~/.berkshelf/config.json` > `/etc/berkshelf/config.json`.
//!
//! Mirrors the teacher's `Config`/`BundleConfig` split: an on-disk struct
//! plus an `Option`-field merge that lets a higher-precedence layer
//! override only the fields it sets.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One layer of configuration; every field is optional so a layer can
/// override only what it sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigLayer {
    pub cache_path: Option<String>,
    pub default_sources: Option<Vec<String>>,
    pub ssl_verify: Option<bool>,
    pub proxy: Option<String>,
    pub no_proxy: Option<Vec<String>>,
    pub api_timeout_secs: Option<u64>,
    pub retry_count: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub concurrency: Option<usize>,
}

impl ConfigLayer {
    /// Merge `other` on top of `self`: any field `other` sets wins.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.cache_path = other.cache_path.or(self.cache_path);
        self.default_sources = other.default_sources.or(self.default_sources);
        self.ssl_verify = other.ssl_verify.or(self.ssl_verify);
        self.proxy = other.proxy.or(self.proxy);
        self.no_proxy = other.no_proxy.or(self.no_proxy);
        self.api_timeout_secs = other.api_timeout_secs.or(self.api_timeout_secs);
        self.retry_count = other.retry_count.or(self.retry_count);
        self.retry_delay_ms = other.retry_delay_ms.or(self.retry_delay_ms);
        self.concurrency = other.concurrency.or(self.concurrency);
        self
    }

    fn from_env() -> Self {
        Self {
            cache_path: crate::env_vars::cache_path(),
            default_sources: crate::env_vars::default_sources(),
            ssl_verify: crate::env_vars::ssl_verify(),
            proxy: crate::env_vars::proxy(),
            no_proxy: crate::env_vars::no_proxy(),
            api_timeout_secs: crate::env_vars::api_timeout().map(|d| d.as_secs()),
            retry_count: crate::env_vars::retry_count(),
            retry_delay_ms: crate::env_vars::retry_delay().map(|d| d.as_millis() as u64),
            concurrency: crate::env_vars::concurrency(),
        }
    }

    fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let layer = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(layer))
    }
}

/// The fully merged configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_path: PathBuf,
    pub default_sources: Vec<String>,
    pub ssl_verify: bool,
    pub proxy: Option<String>,
    pub no_proxy: Vec<String>,
    pub api_timeout_secs: u64,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_path: default_cache_dir(),
            default_sources: vec![crate::DEFAULT_SUPERMARKET_URL.to_string()],
            ssl_verify: true,
            proxy: None,
            no_proxy: Vec::new(),
            api_timeout_secs: 30,
            retry_count: 3,
            retry_delay_ms: 500,
            concurrency: 8,
        }
    }
}

impl Config {
    /// Load configuration from all layers, low to high precedence:
    /// `/etc/berkshelf/config.json`, user config, local `./config.json`,
    /// local `./.berkshelf/config.json`, then environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an existing config file can't be read or
    /// parsed; a missing file at any layer is not an error.
    pub fn load(working_dir: &Path, explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let default = ConfigLayer::default();

        let mut merged = default;
        for path in Self::layer_paths(working_dir, explicit_path) {
            if let Some(layer) = ConfigLayer::read(&path)? {
                merged = merged.merge(layer);
            }
        }
        merged = merged.merge(ConfigLayer::from_env());

        Ok(merged.into_config())
    }

    fn layer_paths(working_dir: &Path, explicit_path: Option<&Path>) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/berkshelf/config.json")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".berkshelf").join("config.json"));
        }
        paths.push(working_dir.join("config.json"));
        paths.push(working_dir.join(".berkshelf").join("config.json"));
        if let Some(explicit) = explicit_path {
            paths.push(explicit.to_path_buf());
        }
        paths
    }
}

impl ConfigLayer {
    fn into_config(self) -> Config {
        let default = Config::default();
        Config {
            cache_path: self.cache_path.map(PathBuf::from).unwrap_or(default.cache_path),
            default_sources: self.default_sources.unwrap_or(default.default_sources),
            ssl_verify: self.ssl_verify.unwrap_or(default.ssl_verify),
            proxy: self.proxy,
            no_proxy: self.no_proxy.unwrap_or(default.no_proxy),
            api_timeout_secs: self.api_timeout_secs.unwrap_or(default.api_timeout_secs),
            retry_count: self.retry_count.unwrap_or(default.retry_count),
            retry_delay_ms: self.retry_delay_ms.unwrap_or(default.retry_delay_ms),
            concurrency: self.concurrency.unwrap_or(default.concurrency),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("berkshelf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_later_layer_when_set() {
        let base = ConfigLayer {
            cache_path: Some("/base/cache".to_string()),
            concurrency: Some(4),
            ..ConfigLayer::default()
        };
        let override_layer = ConfigLayer {
            concurrency: Some(16),
            ..ConfigLayer::default()
        };
        let merged = base.merge(override_layer);
        assert_eq!(merged.cache_path.as_deref(), Some("/base/cache"));
        assert_eq!(merged.concurrency, Some(16));
    }

    #[test]
    fn load_with_no_files_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path(), None).unwrap();
        assert_eq!(config.concurrency, Config::default().concurrency);
    }

    #[test]
    fn load_reads_local_config_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"concurrency": 2}"#).unwrap();
        let config = Config::load(dir.path(), None).unwrap();
        assert_eq!(config.concurrency, 2);
    }
}
