//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, CacheKeysParams, CachePurgeParams, get_impl, keys_impl, purge_impl};
use crate::tools::sw_event::{SwEventParams, event_impl};
use crate::tools::sw_fetch::{SwFetchParams, fetch_impl};
use crate::tools::sw_message::{SwMessageParams, message_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use stash_client::Worker;

/// The main MCP server handler for mcp-stash.
#[derive(Clone)]
pub struct McpStashServer {
    tool_router: ToolRouter<Self>,
    worker: Arc<Worker>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl McpStashServer {
    /// Create a new server handler around an installed worker.
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { tool_router: Self::tool_router(), worker }
    }

    /// Deliver a fetch event to the worker.
    ///
    /// Requests the worker does not intercept are fetched directly and never cached.
    #[tool(
        description = "Fetch a URL through the worker's cache router. Reports the response and whether it came from network, cache, offline fallback or a synthetic 503."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Post a control message (SKIP_WAITING, GET_VERSION or CLEAN_UP) to the worker.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.worker, params.0).await
    }

    #[tool(description = "Deliver a push, notification_click or sync event to the worker.")]
    async fn sw_event(&self, params: Parameters<SwEventParams>) -> Result<CallToolResult, McpError> {
        event_impl(&self.worker, params.0).await
    }

    /// Look up a stored response.
    #[tool(description = "Get a cached response by URL, from one partition or the first partition that holds it.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.worker, params.0).await
    }

    #[tool(description = "List cache partitions and the URLs stored in each.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(&self.worker, params.0).await
    }

    /// Delete a partition, or one URL from it.
    #[tool(description = "Delete a cache partition, or a single URL within it.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.worker, params.0).await
    }
}

impl ServerHandler for McpStashServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-stash".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::active_worker;

    #[tokio::test]
    async fn test_all_tools_registered() {
        let (worker, _) = active_worker(&[]).await;
        let server = McpStashServer::new(worker);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["cache_get", "cache_keys", "cache_purge", "sw_event", "sw_fetch", "sw_message"]);
    }

    #[tokio::test]
    async fn test_server_info() {
        let (worker, _) = active_worker(&[]).await;
        let info = McpStashServer::new(worker).get_info();
        assert_eq!(info.server_info.name, "mcp-stash");
    }
}
