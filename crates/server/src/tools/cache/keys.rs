//! cache_keys tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::Worker;

use crate::tools::json_result;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// List a single partition; all partitions when omitted.
    #[serde(default)]
    pub partition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartitionKeys {
    pub name: String,
    /// Stored URLs in insertion order.
    pub urls: Vec<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub partitions: Vec<PartitionKeys>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(worker: &Worker, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let storage = worker.router().storage();
    let names = match params.partition {
        Some(name) => vec![name],
        None => storage.partitions().await?,
    };

    let mut partitions = Vec::with_capacity(names.len());
    for name in names {
        let urls = storage.keys(&name).await?;
        partitions.push(PartitionKeys { name, urls });
    }

    json_result(&CacheKeysOutput { partitions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{active_worker, output};

    #[tokio::test]
    async fn test_keys_lists_precached_assets() {
        let (worker, _) = active_worker(&[]).await;

        let out: CacheKeysOutput = output(&keys_impl(&worker, CacheKeysParams::default()).await.unwrap());
        let statics = out.partitions.iter().find(|p| p.name == "claude-static-v1.0.0").unwrap();
        assert_eq!(statics.urls, vec!["https://site.test/index.html".to_string()]);
    }

    #[tokio::test]
    async fn test_keys_single_partition() {
        let (worker, _) = active_worker(&[]).await;
        let params = CacheKeysParams { partition: Some("claude-static-v1.0.0".into()) };

        let out: CacheKeysOutput = output(&keys_impl(&worker, params).await.unwrap());
        assert_eq!(out.partitions.len(), 1);
    }
}
