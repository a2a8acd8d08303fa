//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MCP_STASH_*)
//! 2. TOML config file (if MCP_STASH_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! List-valued settings use figment's inline array syntax in the
//! environment, e.g. `MCP_STASH_CDN_HOSTS='["unpkg.com", "cdn.jsdelivr.net"]'`.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Database path that selects the in-memory cache backend.
pub const IN_MEMORY_DB: &str = ":memory:";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MCP_STASH_*)
/// 2. TOML config file (if MCP_STASH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database, or `:memory:`.
    ///
    /// Set via MCP_STASH_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Origin the worker is registered for; relative URLs resolve against it
    /// and requests with this origin are always intercepted.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Name of the current static partition (carries the version tag).
    #[serde(default = "default_static_cache")]
    pub static_cache: String,

    /// Name of the current dynamic partition (carries the version tag).
    #[serde(default = "default_dynamic_cache")]
    pub dynamic_cache: String,

    /// Assets pre-populated into the static partition at install.
    ///
    /// Entries are matched as raw substrings of request URLs during classification.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Path suffixes (without the dot) that always classify as static assets.
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,

    /// Paths that must always be fetched fresh when possible.
    #[serde(default = "default_network_first_paths")]
    pub network_first_paths: Vec<String>,

    /// External content-delivery hosts whose requests are intercepted.
    #[serde(default = "default_cdn_hosts")]
    pub cdn_hosts: Vec<String>,

    /// Page served to HTML navigations when offline and uncached.
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: String,

    /// URL refreshed by the `background-sync` event.
    #[serde(default = "default_sync_url")]
    pub sync_url: String,

    /// Icon attached to push notifications.
    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    /// Badge attached to push notifications.
    #[serde(default = "default_notification_badge")]
    pub notification_badge: String,

    /// Body of the synthetic 503 returned when routing fails outright.
    #[serde(default = "default_unavailable_body")]
    pub unavailable_body: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./mcp-stash-cache.sqlite")
}

fn default_user_agent() -> String {
    "mcp-stash/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_origin() -> String {
    "http://127.0.0.1:8080".into()
}

fn default_static_cache() -> String {
    "claude-static-v1.0.0".into()
}

fn default_dynamic_cache() -> String {
    "claude-dynamic-v1.0.0".into()
}

fn default_static_assets() -> Vec<String> {
    [
        "/claude-introduce/",
        "/claude-introduce/index.html",
        "/claude-introduce/manifest.json",
        "/claude-introduce/assets/css/custom.css",
        "/claude-introduce/assets/js/script.js",
        "https://cdn.tailwindcss.com",
        "https://unpkg.com/alpinejs@3.x.x/dist/cdn.min.js",
        "https://cdn.jsdelivr.net/npm/chart.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_static_extensions() -> Vec<String> {
    ["css", "js", "png", "jpg", "jpeg", "svg", "woff", "woff2"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_network_first_paths() -> Vec<String> {
    vec!["/claude-introduce/sitemap.xml".into(), "/claude-introduce/robots.txt".into()]
}

fn default_cdn_hosts() -> Vec<String> {
    ["cdn.tailwindcss.com", "unpkg.com", "cdn.jsdelivr.net", "api.iconify.design"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_offline_fallback() -> String {
    "/claude-introduce/".into()
}

fn default_sync_url() -> String {
    "/claude-introduce/sitemap.xml".into()
}

fn default_notification_icon() -> String {
    "/claude-introduce/assets/images/icon-192x192.png".into()
}

fn default_notification_badge() -> String {
    "/claude-introduce/assets/images/icon-72x72.png".into()
}

fn default_unavailable_body() -> String {
    "network error".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            origin: default_origin(),
            static_cache: default_static_cache(),
            dynamic_cache: default_dynamic_cache(),
            static_assets: default_static_assets(),
            static_extensions: default_static_extensions(),
            network_first_paths: default_network_first_paths(),
            cdn_hosts: default_cdn_hosts(),
            offline_fallback: default_offline_fallback(),
            sync_url: default_sync_url(),
            notification_icon: default_notification_icon(),
            notification_badge: default_notification_badge(),
            unavailable_body: default_unavailable_body(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether the configured database path selects the in-memory backend.
    pub fn in_memory(&self) -> bool {
        self.db_path.as_os_str() == IN_MEMORY_DB
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MCP_STASH_`
    /// 2. TOML file from `MCP_STASH_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("MCP_STASH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MCP_STASH_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

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
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./mcp-stash-cache.sqlite"));
        assert_eq!(config.user_agent, "mcp-stash/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.static_cache, "claude-static-v1.0.0");
        assert_eq!(config.dynamic_cache, "claude-dynamic-v1.0.0");
        assert_eq!(config.static_assets.len(), 8);
        assert_eq!(config.static_extensions.len(), 8);
        assert_eq!(config.network_first_paths.len(), 2);
        assert!(config.cdn_hosts.contains(&"unpkg.com".to_string()));
        assert!(!config.in_memory());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_in_memory_db_path() {
        let config = AppConfig { db_path: PathBuf::from(IN_MEMORY_DB), ..Default::default() };
        assert!(config.in_memory());
    }

    #[test]
    fn test_load_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MCP_STASH_STATIC_CACHE", "site-static-v2");
            jail.set_env("MCP_STASH_CDN_HOSTS", "[\"fonts.example.net\"]");
            jail.set_env("MCP_STASH_TIMEOUT_MS", "5000");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.static_cache, "site-static-v2");
            assert_eq!(config.cdn_hosts, vec!["fonts.example.net".to_string()]);
            assert_eq!(config.timeout_ms, 5000);
            assert_eq!(config.dynamic_cache, "claude-dynamic-v1.0.0");
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "stash.toml",
                r#"
                origin = "https://example.org"
                network_first_paths = ["/feed.xml"]
                "#,
            )?;
            jail.set_env("MCP_STASH_CONFIG_FILE", "stash.toml");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.origin, "https://example.org");
            assert_eq!(config.network_first_paths, vec!["/feed.xml".to_string()]);
            Ok(())
        });
    }
}
