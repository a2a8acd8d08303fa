//! Cache-first and network-first strategies.
//!
//! Cache writes are best-effort on every path: a storage failure is logged
//! and the response is still returned.

use tokio::task::JoinHandle;

use stash_core::Error;

use super::classify::partition_for;
use super::{ResponseSource, Router};
use crate::fetch::{FetchRequest, FetchResponse};

impl Router {
    /// Serve from cache when present, refreshing in the background; otherwise
    /// fetch and populate. A network failure on a miss propagates.
    pub async fn cache_first(&self, request: &FetchRequest) -> Result<(FetchResponse, ResponseSource), Error> {
        if let Some(cached) = self.lookup(request).await {
            tracing::debug!(url = %request.url, "cache hit");
            drop(self.spawn_refresh(request.clone()));
            return Ok((cached, ResponseSource::Cache));
        }

        tracing::debug!(url = %request.url, "cache miss");
        let response = self.fetcher.fetch(request).await?;
        if response.is_ok() {
            self.store(request, &response).await;
        }
        Ok((response, ResponseSource::Network))
    }

    /// Fetch first; on a transport failure fall back to the cached request,
    /// then, for HTML navigations, to the offline page.
    ///
    /// Non-ok responses are returned as-is and never cached.
    pub async fn network_first(&self, request: &FetchRequest) -> Result<(FetchResponse, ResponseSource), Error> {
        let err = match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store(request, &response).await;
                }
                return Ok((response, ResponseSource::Network));
            }
            Err(e) => e,
        };

        tracing::debug!(url = %request.url, error = %err, "network failed, trying cache");

        if let Some(cached) = self.lookup(request).await {
            return Ok((cached, ResponseSource::Cache));
        }

        if request.accepts_html()
            && let Some(offline) = self.offline_page().await
        {
            tracing::info!(url = %request.url, fallback = %offline.url, "serving offline page");
            return Ok((offline, ResponseSource::Offline));
        }

        Err(err)
    }

    /// Re-fetch `request` and overwrite its partition on an ok response.
    ///
    /// The task is detached by callers: nothing awaits it, nothing cancels it,
    /// and every failure is logged and dropped. Concurrent refreshes of the
    /// same URL race; the last write wins.
    pub fn spawn_refresh(&self, request: FetchRequest) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            match router.fetcher.fetch(&request).await {
                Ok(response) if response.is_ok() => router.store(&request, &response).await,
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status.as_u16(), "refresh not cached");
                }
                Err(e) => tracing::warn!(url = %request.url, error = %e, "background refresh failed"),
            }
        })
    }

    /// Write a response into the partition its URL classifies into.
    pub(crate) async fn store(&self, request: &FetchRequest, response: &FetchResponse) {
        let partition = partition_for(&self.config, &request.url);
        let entry = response.to_cached(&request.method);
        if let Err(e) = self.storage.put(partition, &entry).await {
            tracing::warn!(url = %request.url, partition, error = %e, "cache write failed");
        }
    }

    /// Look up `request` across all partitions. Storage failures count as a miss.
    async fn lookup(&self, request: &FetchRequest) -> Option<FetchResponse> {
        let found = self
            .storage
            .match_any(request.method.as_str(), request.url.as_str())
            .await
            .and_then(|entry| entry.map(FetchResponse::from_cached).transpose());

        match found {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Cached root page, else any cached HTML document.
    async fn offline_page(&self) -> Option<FetchResponse> {
        let root = self.config.offline_fallback.as_str();
        let found = match self.storage.match_any("GET", root).await {
            Ok(Some(entry)) => Ok(Some(entry)),
            Ok(None) => self.storage.match_html().await,
            Err(e) => Err(e),
        };

        match found.and_then(|entry| entry.map(FetchResponse::from_cached).transpose()) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "offline page lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use reqwest::{Method, StatusCode};
    use stash_core::{CacheStorage, MemoryCache};

    use crate::fetch::testing::Scripted;
    use crate::router::test_support::*;
    use crate::router::{ResponseSource, Router};

    const STATIC: &str = "claude-static-v1.0.0";
    const DYNAMIC: &str = "claude-dynamic-v1.0.0";

    #[tokio::test]
    async fn test_cache_first_miss_populates_static_partition() {
        let (router, storage, fetcher) = router();
        fetcher.respond("https://site.test/app/main.css", 200, "text/css", "body{}");

        let (response, source) = router.cache_first(&request("https://site.test/app/main.css", None)).await.unwrap();
        assert_eq!(source, ResponseSource::Network);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(storage.keys(STATIC).await.unwrap(), vec!["https://site.test/app/main.css".to_string()]);
        assert!(storage.keys(DYNAMIC).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_first_miss_network_failure_propagates() {
        let (router, storage, _fetcher) = router();
        let result = router.cache_first(&request("https://site.test/app/main.css", None)).await;
        assert!(matches!(result, Err(e) if e.is_network()));
        assert!(storage.partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_first_does_not_cache_non_ok() {
        let (router, storage, fetcher) = router();
        fetcher.respond("https://site.test/app/missing.js", 404, "text/plain", "nope");

        let (response, _) = router.cache_first(&request("https://site.test/app/missing.js", None)).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(storage.match_any("GET", "https://site.test/app/missing.js").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_first_warm_never_blocks_on_network() {
        let (router, _storage, fetcher) = router();
        fetcher.respond("https://site.test/app/main.js", 200, "text/javascript", "v1");
        router.cache_first(&request("https://site.test/app/main.js", None)).await.unwrap();

        // From now on the network never answers.
        fetcher.set("https://site.test/app/main.js", Scripted::Hang);

        for _ in 0..3 {
            let result = tokio::time::timeout(
                Duration::from_millis(200),
                router.cache_first(&request("https://site.test/app/main.js", None)),
            )
            .await
            .expect("warm cache hit must not wait on the network");
            let (response, source) = result.unwrap();
            assert_eq!(source, ResponseSource::Cache);
            assert_eq!(&response.bytes[..], b"v1");
        }
    }

    #[tokio::test]
    async fn test_background_refresh_overwrites_entry() {
        let (router, storage, fetcher) = router();
        fetcher.respond("https://site.test/app/main.js", 200, "text/javascript", "v1");
        router.cache_first(&request("https://site.test/app/main.js", None)).await.unwrap();

        fetcher.respond("https://site.test/app/main.js", 200, "text/javascript", "v2");
        router.spawn_refresh(request("https://site.test/app/main.js", None)).await.unwrap();

        let entry = storage.get(STATIC, "GET", "https://site.test/app/main.js").await.unwrap().unwrap();
        assert_eq!(entry.body, b"v2");
    }

    #[tokio::test]
    async fn test_background_refresh_failure_keeps_entry() {
        let (router, storage, fetcher) = router();
        fetcher.respond("https://site.test/app/main.js", 200, "text/javascript", "v1");
        router.cache_first(&request("https://site.test/app/main.js", None)).await.unwrap();

        fetcher.set("https://site.test/app/main.js", Scripted::Fail);
        router.spawn_refresh(request("https://site.test/app/main.js", None)).await.unwrap();

        fetcher.respond("https://site.test/app/main.js", 500, "text/plain", "boom");
        router.spawn_refresh(request("https://site.test/app/main.js", None)).await.unwrap();

        let entry = storage.get(STATIC, "GET", "https://site.test/app/main.js").await.unwrap().unwrap();
        assert_eq!(entry.body, b"v1");
    }

    #[tokio::test]
    async fn test_network_first_caches_ok_in_dynamic() {
        let (router, storage, fetcher) = router();
        fetcher.respond("https://site.test/news", 200, "text/html", "<p>news</p>");

        let (_, source) = router.network_first(&request("https://site.test/news", Some("text/html"))).await.unwrap();
        assert_eq!(source, ResponseSource::Network);
        assert!(storage.get(DYNAMIC, "GET", "https://site.test/news").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_network_first_returns_but_does_not_cache_404() {
        let (router, storage, fetcher) = router();
        fetcher.respond("https://site.test/gone", 404, "text/html", "not found");

        let (response, source) = router.network_first(&request("https://site.test/gone", Some("text/html"))).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(source, ResponseSource::Network);
        assert!(storage.match_any("GET", "https://site.test/gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cached_request() {
        let (router, _storage, fetcher) = router();
        fetcher.respond("https://site.test/news", 200, "text/html", "cached news");
        router.network_first(&request("https://site.test/news", Some("text/html"))).await.unwrap();

        fetcher.set("https://site.test/news", Scripted::Fail);
        let (response, source) = router.network_first(&request("https://site.test/news", Some("text/html"))).await.unwrap();
        assert_eq!(source, ResponseSource::Cache);
        assert_eq!(&response.bytes[..], b"cached news");
    }

    #[tokio::test]
    async fn test_html_offline_prefers_root_page() {
        let (router, storage, _fetcher) = router();
        let root = crate::router::test_support::config().offline_fallback;
        storage
            .put(DYNAMIC, &html_entry("https://site.test/other-page", "other"))
            .await
            .unwrap();
        storage.put(STATIC, &html_entry(root.as_str(), "home")).await.unwrap();

        let (response, source) =
            router.network_first(&request("https://site.test/unseen", Some("text/html"))).await.unwrap();
        assert_eq!(source, ResponseSource::Offline);
        assert_eq!(&response.bytes[..], b"home");
    }

    #[tokio::test]
    async fn test_html_offline_falls_back_to_any_html() {
        let (router, storage, _fetcher) = router();
        storage
            .put(DYNAMIC, &html_entry("https://site.test/other-page", "other"))
            .await
            .unwrap();

        let (response, source) =
            router.network_first(&request("https://site.test/unseen", Some("text/html"))).await.unwrap();
        assert_eq!(source, ResponseSource::Offline);
        assert_eq!(&response.bytes[..], b"other");
    }

    #[tokio::test]
    async fn test_html_offline_without_cache_propagates() {
        let (router, _storage, _fetcher) = router();
        let result = router.network_first(&request("https://site.test/unseen", Some("text/html"))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_non_html_offline_does_not_use_fallback() {
        let (router, storage, _fetcher) = router();
        storage.put(STATIC, &html_entry("https://site.test/claude-introduce/", "home")).await.unwrap();

        let result = router.network_first(&request("https://site.test/api", Some("application/json"))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_response() {
        let storage = Arc::new(MemoryCache::with_quota(0));
        let fetcher = Arc::new(crate::fetch::testing::ScriptedFetcher::new());
        let router = Router::new(crate::router::test_support::config(), storage.clone(), fetcher.clone());
        fetcher.respond("https://site.test/news", 200, "text/html", "fresh");

        let (response, source) = router.network_first(&request("https://site.test/news", Some("text/html"))).await.unwrap();
        assert_eq!(source, ResponseSource::Network);
        assert_eq!(&response.bytes[..], b"fresh");
        assert!(storage.partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_get_is_fetched_but_not_cached() {
        let (router, storage, fetcher) = router();
        fetcher.respond("https://site.test/api/submit", 200, "application/json", "{}");

        let post = request("https://site.test/api/submit", None).with_method(Method::POST);
        let (response, _) = router.network_first(&post).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert!(storage.partitions().await.unwrap().is_empty());
    }

    fn html_entry(url: &str, body: &str) -> stash_core::CachedResponse {
        let mut headers = std::collections::BTreeMap::new();
        headers.insert("content-type".to_string(), "text/html; charset=utf-8".to_string());
        stash_core::CachedResponse::new(url, 200, headers, body.as_bytes().to_vec())
    }
}
