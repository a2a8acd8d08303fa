//! Stored request/response pairs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::hash::compute_cache_key;

/// A response stored in a cache partition.
///
/// Keyed by `(method, url)` of the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CachedResponse {
    /// Build an entry for a `GET` request, stamped with the current time.
    pub fn new(url: impl Into<String>, status: u16, headers: BTreeMap<String, String>, body: Vec<u8>) -> Self {
        let headers: BTreeMap<String, String> =
            headers.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect();
        let content_type = headers.get("content-type").cloned();
        Self {
            method: "GET".into(),
            url: url.into(),
            status,
            content_type,
            headers,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Storage key of this entry.
    pub fn key_hash(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }

    /// Status in the 200-299 range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| ct.contains("text/html"))
    }
}
