//! Request cache router.
//!
//! ### Classification
//! - Every intercepted request maps to exactly one [`RequestClass`], from its
//!   URL and `accept` header only.
//! - Static assets and images are served cache-first; sitemap-style paths,
//!   HTML navigations and everything else are served network-first.
//!
//! ### Partitions
//! - `static`: versioned, filled at install, refreshed for static assets.
//! - `dynamic`: filled lazily by every other successful fetch.
//! - On activation every partition that is neither is deleted.
//!
//! ### Failure surface
//! - A routing failure never escapes: it becomes a synthetic 503.

pub mod classify;
pub mod events;
pub mod lifecycle;
pub mod message;
pub mod strategy;

use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use stash_core::{AppConfig, CacheStorage, Error};

use crate::fetch::{FetchRequest, FetchResponse, Fetcher, resolve};

pub use classify::{RequestClass, Strategy};
pub use events::{Notification, NotificationAction, NotificationClick, PushPayload, SyncOutcome};
pub use lifecycle::{FetchOutcome, LifecycleState, Worker};
pub use message::{ControlMessage, ControlReply};

/// Immutable routing configuration, built once from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub origin: Url,
    pub static_cache: String,
    pub dynamic_cache: String,
    /// Raw entries, used both for install and for substring classification.
    pub static_assets: Vec<String>,
    pub static_extensions: Vec<String>,
    pub network_first_paths: Vec<String>,
    pub cdn_hosts: Vec<String>,
    pub offline_fallback: Url,
    pub sync_url: Url,
    pub notification_icon: String,
    pub notification_badge: String,
    pub unavailable_body: String,
}

impl TryFrom<&AppConfig> for RouterConfig {
    type Error = Error;

    fn try_from(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        let offline_fallback =
            resolve(&origin, &config.offline_fallback).map_err(|e| Error::InvalidUrl(format!("offline_fallback: {e}")))?;
        let sync_url = resolve(&origin, &config.sync_url).map_err(|e| Error::InvalidUrl(format!("sync_url: {e}")))?;

        Ok(Self {
            origin,
            static_cache: config.static_cache.clone(),
            dynamic_cache: config.dynamic_cache.clone(),
            static_assets: config.static_assets.clone(),
            static_extensions: config.static_extensions.clone(),
            network_first_paths: config.network_first_paths.clone(),
            cdn_hosts: config.cdn_hosts.clone(),
            offline_fallback,
            sync_url,
            notification_icon: config.notification_icon.clone(),
            notification_badge: config.notification_badge.clone(),
            unavailable_body: config.unavailable_body.clone(),
        })
    }
}

/// Where a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    /// Cached offline fallback page served for an HTML navigation.
    Offline,
    /// Generated 503 after an unhandled failure.
    Synthetic,
}

/// A response produced by the router.
#[derive(Debug, Clone)]
pub struct Routed {
    pub class: RequestClass,
    pub source: ResponseSource,
    pub response: FetchResponse,
}

/// Routes intercepted requests through the cache partitions.
///
/// Holds no per-request state; cloning is cheap and clones share storage
/// and fetcher.
#[derive(Clone)]
pub struct Router {
    config: Arc<RouterConfig>,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
}

impl Router {
    pub fn new(config: RouterConfig, storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { config: Arc::new(config), storage, fetcher }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Classify a request and run the matching strategy.
    ///
    /// Never fails: an error from the strategy is logged and answered with a
    /// synthetic `503` carrying the configured plain-text body.
    pub async fn route(&self, request: &FetchRequest) -> Routed {
        let class = classify::classify(&self.config, &request.url, request.accept.as_deref());
        tracing::debug!(url = %request.url, class = class.as_str(), "routing request");

        let result = match class.strategy() {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
        };

        match result {
            Ok((response, source)) => Routed { class, source, response },
            Err(e) => {
                tracing::error!(url = %request.url, error = %e, "request handling failed");
                Routed {
                    class,
                    source: ResponseSource::Synthetic,
                    response: FetchResponse::unavailable(request.url.clone(), &self.config.unavailable_body),
                }
            }
        }
    }
}
