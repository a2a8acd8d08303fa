//! HTTP fetch pipeline.
//!
//! ### Fetcher seam
//! - The router only sees the [`Fetcher`] trait, so tests drive it with
//!   scripted responses instead of a live network.
//! - [`FetchClient`] is the reqwest-backed implementation.
//!
//! ### Failure model
//! - A response with any status is a successful fetch; callers decide what
//!   "ok" means.
//! - Only transport failures (connect, DNS, TLS, timeout) and oversized
//!   bodies are errors.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod url;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
pub use reqwest::{Method, StatusCode, Url};

pub use self::url::{UrlError, resolve};

use stash_core::{AppConfig, CachedResponse, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "mcp-stash/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "mcp-stash/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    /// Value of the `accept` header, if any.
    pub accept: Option<String>,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, accept: None }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Whether the request asks for an HTML document.
    pub fn accepts_html(&self) -> bool {
        self.accept.as_deref().is_some_and(|a| a.contains("text/html"))
    }
}

/// Response from a fetch operation, or one served from cache.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL the response belongs to
    pub url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Time taken to fetch in milliseconds (0 when served from cache)
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Status in the 200-299 range.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    /// Synthetic `503 Service Unavailable` with a plain-text body.
    pub fn unavailable(url: Url, body: &str) -> Self {
        let mut headers = header::HeaderMap::new();
        let content_type = "text/plain; charset=utf-8";
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
        Self {
            url,
            status: StatusCode::SERVICE_UNAVAILABLE,
            content_type: Some(content_type.to_string()),
            bytes: Bytes::copy_from_slice(body.as_bytes()),
            headers,
            fetch_ms: 0,
        }
    }

    /// Copy this response into a storable cache entry for `method`.
    pub fn to_cached(&self, method: &Method) -> CachedResponse {
        let headers: BTreeMap<String, String> = self
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let mut entry = CachedResponse::new(self.url.as_str(), self.status.as_u16(), headers, self.bytes.to_vec());
        entry.method = method.as_str().to_string();
        if entry.content_type.is_none() {
            entry.content_type = self.content_type.clone();
        }
        entry
    }

    /// Rebuild a response from a cache entry.
    pub fn from_cached(entry: CachedResponse) -> Result<Self, Error> {
        let url = Url::parse(&entry.url).map_err(|e| Error::Storage(format!("stored URL is invalid: {e}")))?;
        let status = StatusCode::from_u16(entry.status)
            .map_err(|e| Error::Storage(format!("stored status is invalid: {e}")))?;

        let mut headers = header::HeaderMap::new();
        for (name, value) in &entry.headers {
            if let (Ok(name), Ok(value)) =
                (header::HeaderName::from_bytes(name.as_bytes()), header::HeaderValue::from_str(value))
            {
                headers.insert(name, value);
            }
        }

        Ok(Self {
            url,
            status,
            content_type: entry.content_type,
            bytes: Bytes::from(entry.body),
            headers,
            fetch_ms: 0,
        })
    }
}

/// Network access used by the router.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. Any HTTP status is `Ok`; only transport failures are `Err`.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error>;
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn map_reqwest_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::Network(err.to_string()) }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method.clone(), request.url.clone());
        if let Some(accept) = &request.accept {
            builder = builder.header(header::ACCEPT, accept);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let headers = response.headers().clone();

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            url = %request.url,
            status = status.as_u16(),
            fetch_ms,
            bytes = bytes.len(),
            "fetched"
        );

        Ok(FetchResponse { url: request.url.clone(), status, content_type, bytes, headers, fetch_ms })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted fetcher for router tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// What the fake network does for a URL.
    #[derive(Debug, Clone)]
    pub enum Scripted {
        Respond { status: u16, content_type: &'static str, body: String },
        Fail,
        /// Never completes.
        Hang,
    }

    /// Fetcher that answers from a per-URL script. Unscripted URLs fail.
    #[derive(Default)]
    pub struct ScriptedFetcher {
        script: Mutex<HashMap<String, Scripted>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, url: &str, status: u16, content_type: &'static str, body: &str) {
            self.set(url, Scripted::Respond { status, content_type, body: body.to_string() });
        }

        pub fn set(&self, url: &str, behaviour: Scripted) {
            self.script.lock().unwrap().insert(url.to_string(), behaviour);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let behaviour = self.script.lock().unwrap().get(request.url.as_str()).cloned();
            match behaviour {
                Some(Scripted::Respond { status, content_type, body }) => {
                    let mut headers = header::HeaderMap::new();
                    headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
                    Ok(FetchResponse {
                        url: request.url.clone(),
                        status: StatusCode::from_u16(status).unwrap(),
                        content_type: Some(content_type.to_string()),
                        bytes: Bytes::from(body),
                        headers,
                        fetch_ms: 1,
                    })
                }
                Some(Scripted::Hang) => std::future::pending().await,
                Some(Scripted::Fail) | None => Err(Error::Network(format!("connection refused: {}", request.url))),
            }
        }
    }
}
