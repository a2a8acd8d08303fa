//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;
use url::Url;

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

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `origin` is not an http(s) URL, or `offline_fallback` does not resolve against it
    /// - partition names are empty or identical
    ///
    /// Returns `ConfigError::Missing` if `static_assets` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
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

        let origin = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must use http or https".into() });
        }
        origin
            .join(&self.offline_fallback)
            .map_err(|e| ConfigError::Invalid { field: "offline_fallback".into(), reason: e.to_string() })?;

        if self.static_cache.is_empty() {
            return Err(ConfigError::Invalid { field: "static_cache".into(), reason: "must not be empty".into() });
        }
        if self.dynamic_cache.is_empty() {
            return Err(ConfigError::Invalid { field: "dynamic_cache".into(), reason: "must not be empty".into() });
        }
        if self.static_cache == self.dynamic_cache {
            return Err(ConfigError::Invalid {
                field: "dynamic_cache".into(),
                reason: "must differ from static_cache".into(),
            });
        }

        if self.static_assets.is_empty() {
            return Err(ConfigError::Missing {
                field: "static_assets".into(),
                hint: "Set MCP_STASH_STATIC_ASSETS or static_assets in the config file".into(),
            });
        }

        if self.cdn_hosts.iter().any(|h| h.is_empty()) {
            tracing::warn!("cdn_hosts contains an empty entry; every external request will be intercepted");
        }

        Ok(())
    }
}
