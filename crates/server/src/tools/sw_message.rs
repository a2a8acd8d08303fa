//! sw_message tool implementation.
//!
//! Posts a control message to the worker.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stash_client::{ControlReply, Worker};

use super::json_result;

/// Input parameters for sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message object, e.g. `{"type": "GET_VERSION"}`.
    pub message: Value,
}

/// Output structure for sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    /// False when the message type was not recognised.
    pub handled: bool,
    /// Reply posted back to the sender, if any.
    pub version: Option<String>,
    pub deleted: Option<Vec<String>>,
    /// Lifecycle state after the message was processed.
    pub state: String,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(worker: &Worker, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let reply = worker.handle_message(&params.message).await?;
    let handled = reply.is_some();
    let ControlReply { version, deleted } = reply.unwrap_or_default();

    json_result(&SwMessageOutput { handled, version, deleted, state: worker.state().await.as_str().to_string() })
}
