//! MCP tool implementations.
//!
//! This module contains all tools exposed by the mcp-stash server.

pub mod cache;
pub mod sw_event;
pub mod sw_fetch;
pub mod sw_message;

use rmcp::{ErrorData as McpError, model::CallToolResult, model::Content};
use serde::Serialize;

use crate::error::ToolError;

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(ToolError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
