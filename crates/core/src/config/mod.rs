//! Cache configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PROXC_*)
//! 2. TOML config file (if PROXC_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::httpcache::{COMPRESSIBLE_TYPES, StoragePolicy};

mod validation;

pub use validation::ConfigError;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_FILE_ENV: &str = "PROXC_CONFIG_FILE";

const ENV_PREFIX: &str = "PROXC_";

/// Cache configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PROXC_*)
/// 2. TOML config file (if PROXC_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one database per host plus `file.sqlite`.
    ///
    /// Set via PROXC_DB_DIR environment variable.
    #[serde(default = "default_db_dir")]
    pub db_dir: PathBuf,

    /// Keep everything in a single in-memory database.
    ///
    /// Set via PROXC_IN_MEMORY environment variable.
    #[serde(default)]
    pub in_memory: bool,

    /// Storage encoding for compressible bodies sent without one.
    ///
    /// Set via PROXC_DEFAULT_ENCODING environment variable.
    #[serde(default = "default_encoding")]
    pub default_encoding: String,

    /// Media types stored with `default_encoding`.
    #[serde(default = "default_compressible_types")]
    pub compressible_types: Vec<String>,

    /// Serve identity instead of failing when negotiation finds nothing.
    ///
    /// Set via PROXC_IDENTITY_FALLBACK environment variable.
    #[serde(default)]
    pub identity_fallback: bool,

    /// User-Agent string for upstream requests.
    ///
    /// Set via PROXC_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via PROXC_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_db_dir() -> PathBuf {
    PathBuf::from("./proxc-db")
}

fn default_encoding() -> String {
    proxc_encoding::ZSTD.into()
}

fn default_compressible_types() -> Vec<String> {
    COMPRESSIBLE_TYPES.iter().map(|t| t.to_string()).collect()
}

fn default_user_agent() -> String {
    "proxc/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_dir: default_db_dir(),
            in_memory: false,
            default_encoding: default_encoding(),
            compressible_types: default_compressible_types(),
            identity_fallback: false,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl CacheConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Storage policy described by this configuration.
    pub fn storage_policy(&self) -> StoragePolicy {
        StoragePolicy {
            default_encoding: self.default_encoding.clone(),
            compressible: self.compressible_types.iter().map(|t| t.trim().to_ascii_lowercase()).collect(),
            identity_fallback: self.identity_fallback,
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PROXC_`
    /// 2. TOML file from `PROXC_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var(CONFIG_FILE_ENV) {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        ))
    }

    /// Load from an explicit TOML file on top of the defaults, ignoring the
    /// environment.
    pub fn load_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        Self::extract(Figment::from(Serialized::defaults(Self::default())).merge(Toml::file(path.as_ref())))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.db_dir, PathBuf::from("./proxc-db"));
        assert!(!config.in_memory);
        assert_eq!(config.default_encoding, "zstd");
        assert_eq!(config.compressible_types.len(), COMPRESSIBLE_TYPES.len());
        assert!(!config.identity_fallback);
        assert_eq!(config.user_agent, "proxc/0.1");
        assert_eq!(config.timeout_ms, 20_000);
    }

    #[test]
    fn test_timeout_duration() {
        let config = CacheConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_storage_policy() {
        let config = CacheConfig {
            default_encoding: "br".into(),
            compressible_types: vec![" Text/CSV ".into()],
            identity_fallback: true,
            ..Default::default()
        };
        let policy = config.storage_policy();
        assert_eq!(policy.storage_encoding("", "text/csv"), "br");
        assert_eq!(policy.storage_encoding("", "text/html"), "");
        assert!(policy.identity_fallback);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxc.toml");
        std::fs::write(&path, "db_dir = \"/var/cache/proxc\"\ndefault_encoding = \"gzip\"\n").unwrap();

        let config = CacheConfig::load_file(&path).unwrap();
        assert_eq!(config.db_dir, PathBuf::from("/var/cache/proxc"));
        assert_eq!(config.default_encoding, "gzip");
        assert_eq!(config.timeout_ms, 20_000);
    }

    #[test]
    fn test_load_file_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxc.toml");
        std::fs::write(&path, "default_encoding = \"lz4\"\n").unwrap();

        let err = CacheConfig::load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field, .. } if field == "default_encoding"));
    }
}
