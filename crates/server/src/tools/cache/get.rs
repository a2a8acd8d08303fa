//! cache_get tool implementation.
//!
//! Looks up a stored response in one partition or across all of them.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::Worker;
use stash_client::fetch::resolve;
use stash_core::Error;

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// URL (or origin-relative path) of the cached request.
    pub url: String,

    /// Partition to search; all partitions when omitted, oldest first.
    #[serde(default)]
    pub partition: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// RFC 3339 timestamp of the write.
    pub stored_at: String,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(worker: &Worker, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = resolve(&worker.router().config().origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let storage = worker.router().storage();

    let entry = match params.partition.as_deref() {
        Some(partition) => storage.get(partition, "GET", url.as_str()).await?,
        None => storage.match_any("GET", url.as_str()).await?,
    }
    .ok_or_else(|| Error::CacheMiss(url.to_string()))?;

    json_result(&CacheGetOutput {
        url: entry.url,
        status: entry.status,
        content_type: entry.content_type,
        stored_at: entry.stored_at,
        body: String::from_utf8_lossy(&entry.body).into_owned(),
    })
}
