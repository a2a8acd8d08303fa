//! Request classification.
//!
//! Pure functions of the URL, the `accept` header and the router
//! configuration. Nothing here touches the network or the cache.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::RouterConfig;

/// Handling class of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    StaticAsset,
    NetworkFirstPath,
    HtmlNavigation,
    Image,
    Default,
}

/// Caching strategy a class is served with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
}

impl RequestClass {
    pub fn strategy(self) -> Strategy {
        match self {
            RequestClass::StaticAsset | RequestClass::Image => Strategy::CacheFirst,
            RequestClass::NetworkFirstPath | RequestClass::HtmlNavigation | RequestClass::Default => {
                Strategy::NetworkFirst
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestClass::StaticAsset => "static_asset",
            RequestClass::NetworkFirstPath => "network_first_path",
            RequestClass::HtmlNavigation => "html_navigation",
            RequestClass::Image => "image",
            RequestClass::Default => "default",
        }
    }
}

/// Classify a request. First match wins, in this order: static asset,
/// network-first path, HTML navigation, image, default.
pub fn classify(config: &RouterConfig, url: &Url, accept: Option<&str>) -> RequestClass {
    if is_static_asset(config, url) {
        return RequestClass::StaticAsset;
    }
    if is_network_first(config, url) {
        return RequestClass::NetworkFirstPath;
    }

    let accept = accept.unwrap_or_default();
    if accept.contains("text/html") {
        RequestClass::HtmlNavigation
    } else if accept.contains("image") {
        RequestClass::Image
    } else {
        RequestClass::Default
    }
}

/// Static extension suffix on the path, or any configured static asset
/// appearing verbatim anywhere in the full URL.
///
/// The substring test is not path-aware: an asset entry such as
/// `/claude-introduce/` matches every URL below that directory.
pub fn is_static_asset(config: &RouterConfig, url: &Url) -> bool {
    let path = url.path();
    let by_extension = config
        .static_extensions
        .iter()
        .any(|ext| path.strip_suffix(ext.as_str()).is_some_and(|rest| rest.ends_with('.')));

    by_extension || config.static_assets.iter().any(|asset| url.as_str().contains(asset.as_str()))
}

pub fn is_network_first(config: &RouterConfig, url: &Url) -> bool {
    let path = url.path();
    config.network_first_paths.iter().any(|p| path.contains(p.as_str()))
}

/// Host contains one of the allow-listed CDN hosts.
pub fn is_cdn_resource(config: &RouterConfig, url: &Url) -> bool {
    let host = url.host_str().unwrap_or_default();
    config.cdn_hosts.iter().any(|h| host.contains(h.as_str()))
}

/// Same-origin or allow-listed CDN requests are intercepted; everything else
/// gets default network handling.
pub fn should_intercept(config: &RouterConfig, url: &Url) -> bool {
    url.origin() == config.origin.origin() || is_cdn_resource(config, url)
}

/// Partition a successful response for `url` is written to.
pub fn partition_for<'a>(config: &'a RouterConfig, url: &Url) -> &'a str {
    if is_static_asset(config, url) { &config.static_cache } else { &config.dynamic_cache }
}
