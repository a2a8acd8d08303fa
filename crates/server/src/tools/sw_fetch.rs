//! sw_fetch tool implementation.
//!
//! Delivers a fetch event to the worker and reports how it was answered.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::fetch::{FetchResponse, Method, resolve};
use stash_client::{FetchOutcome, FetchRequest, ResponseSource, Worker};
use stash_core::Error;

use super::json_result;

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the worker origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Value of the Accept header, e.g. "text/html" for a navigation.
    #[serde(default)]
    pub accept: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// How the response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    Network,
    Cache,
    Offline,
    Synthetic,
    /// Not intercepted; fetched without touching the cache.
    Passthrough,
}

impl From<ResponseSource> for FetchSource {
    fn from(source: ResponseSource) -> Self {
        match source {
            ResponseSource::Network => FetchSource::Network,
            ResponseSource::Cache => FetchSource::Cache,
            ResponseSource::Offline => FetchSource::Offline,
            ResponseSource::Synthetic => FetchSource::Synthetic,
        }
    }
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// The URL the response belongs to.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    pub source: FetchSource,
    /// Request class chosen by the router (absent for pass-through).
    pub class: Option<String>,
    /// Content-Type header.
    pub content_type: Option<String>,
    /// Network time in milliseconds (0 for cached responses).
    pub fetch_ms: u64,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
}

impl SwFetchOutput {
    fn new(response: FetchResponse, source: FetchSource, class: Option<String>) -> Self {
        Self {
            url: response.url.to_string(),
            status: response.status.as_u16(),
            source,
            class,
            content_type: response.content_type,
            fetch_ms: response.fetch_ms,
            body: String::from_utf8_lossy(&response.bytes).into_owned(),
        }
    }
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(worker: &Worker, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let url = resolve(&worker.router().config().origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = parse_method(&params.method)?;

    let mut request = FetchRequest::get(url).with_method(method);
    if let Some(accept) = params.accept {
        request = request.with_accept(accept);
    }

    let output = match worker.handle_fetch(&request).await {
        FetchOutcome::Routed(routed) => {
            SwFetchOutput::new(routed.response, routed.source.into(), Some(routed.class.as_str().to_string()))
        }
        FetchOutcome::PassThrough => {
            let response = worker.router().fetcher().fetch(&request).await?;
            SwFetchOutput::new(response, FetchSource::Passthrough, None)
        }
    };

    json_result(&output)
}

fn parse_method(method: &str) -> Result<Method, Error> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|e| Error::InvalidInput(format!("invalid method '{method}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{active_worker, output};
    use stash_core::CacheStorage;

    fn params(url: &str, accept: Option<&str>) -> SwFetchParams {
        SwFetchParams { url: url.into(), method: "GET".into(), accept: accept.map(String::from) }
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let (worker, _) = active_worker(&[]).await;
        let result = fetch_impl(&worker, params("  ", None)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_invalid_method() {
        let (worker, _) = active_worker(&[]).await;
        let mut p = params("/index.html", None);
        p.method = "NOT A METHOD".into();
        assert!(fetch_impl(&worker, p).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_precached_asset_from_cache() {
        let (worker, _) = active_worker(&[]).await;
        let result = fetch_impl(&worker, params("/index.html", Some("text/html"))).await.unwrap();
        let out: SwFetchOutput = output(&result);

        assert_eq!(out.source, FetchSource::Cache);
        assert_eq!(out.class.as_deref(), Some("static_asset"));
        assert_eq!(out.body, "<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_fetch_offline_navigation_serves_fallback() {
        let (worker, _) = active_worker(&[]).await;
        let result = fetch_impl(&worker, params("/docs/intro", Some("text/html"))).await.unwrap();
        let out: SwFetchOutput = output(&result);

        assert_eq!(out.source, FetchSource::Offline);
        assert_eq!(out.class.as_deref(), Some("html_navigation"));
        assert_eq!(out.status, 200);
        assert_eq!(out.body, "<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_fetch_unhandled_failure_is_503() {
        let (worker, _) = active_worker(&[]).await;
        let result = fetch_impl(&worker, params("/api/stats", Some("application/json"))).await.unwrap();
        let out: SwFetchOutput = output(&result);

        assert_eq!(out.source, FetchSource::Synthetic);
        assert_eq!(out.status, 503);
        assert_eq!(out.body, "network error");
    }

    #[tokio::test]
    async fn test_fetch_foreign_origin_passes_through() {
        let (worker, storage) =
            active_worker(&[("https://elsewhere.test/data.json", 200, "application/json", "{}")]).await;
        let result = fetch_impl(&worker, params("https://elsewhere.test/data.json", None)).await.unwrap();
        let out: SwFetchOutput = output(&result);

        assert_eq!(out.source, FetchSource::Passthrough);
        assert_eq!(out.class, None);
        assert!(storage.match_any("GET", "https://elsewhere.test/data.json").await.unwrap().is_none());
    }
}
