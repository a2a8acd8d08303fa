//! cache_purge tool implementation.
//!
//! Drops a whole partition, or a single entry from it.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::Worker;
use stash_client::fetch::resolve;
use stash_core::Error;

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Partition to purge.
    pub partition: String,

    /// Remove only this URL; the whole partition when omitted.
    #[serde(default)]
    pub url: Option<String>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Whether anything was removed.
    pub deleted: bool,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(worker: &Worker, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.partition.trim().is_empty() {
        return Err(Error::InvalidInput("partition cannot be empty".into()).into());
    }
    let storage = worker.router().storage();

    let deleted = match params.url {
        Some(url) => {
            let url = resolve(&worker.router().config().origin, &url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
            storage.delete(&params.partition, "GET", url.as_str()).await?
        }
        None => storage.delete_partition(&params.partition).await?,
    };

    tracing::info!(partition = %params.partition, deleted, "cache purge");
    json_result(&CachePurgeOutput { deleted })
}
