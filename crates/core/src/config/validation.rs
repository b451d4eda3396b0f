//! Configuration validation rules.
//!
//! This module provides validation logic for `CacheConfig` values
//! after they have been loaded from environment, files, or defaults.

use proxc_encoding::Registry;
use thiserror::Error;

use crate::config::CacheConfig;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `db_dir` is empty while not running
    /// in memory, and `ConfigError::Invalid` if:
    /// - `default_encoding` is not a registered codec
    /// - `compressible_types` is empty
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.in_memory && self.db_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                field: "db_dir".into(),
                hint: "Set PROXC_DB_DIR or PROXC_IN_MEMORY=true".into(),
            });
        }

        if !Registry::global().is_supported(&self.default_encoding) {
            return Err(ConfigError::Invalid {
                field: "default_encoding".into(),
                reason: format!("unsupported encoding {:?}", self.default_encoding),
            });
        }

        if self.compressible_types.is_empty() {
            return Err(ConfigError::Invalid {
                field: "compressible_types".into(),
                reason: "must list at least one media type".into(),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.in_memory && self.db_dir != CacheConfig::default().db_dir {
            tracing::warn!(db_dir = %self.db_dir.display(), "in_memory is set; db_dir is ignored");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_db_dir() {
        let config = CacheConfig { db_dir: PathBuf::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "db_dir"));

        let config = CacheConfig { db_dir: PathBuf::new(), in_memory: true, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_encoding() {
        let config = CacheConfig { default_encoding: "lzma".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "default_encoding"));
    }

    #[test]
    fn test_validate_identity_is_allowed() {
        let config = CacheConfig { default_encoding: "identity".into(), ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_compressible_types() {
        let config = CacheConfig { compressible_types: Vec::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "compressible_types"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = CacheConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = CacheConfig { timeout_ms: 301_000, ..Default::default() }; // 5min 1sec
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = CacheConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = CacheConfig { timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());
        let config = CacheConfig { timeout_ms: 300_000, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
