//! Out-of-band control channel.
//!
//! Messages are JSON objects tagged by `type`:
//! `{"type": "SKIP_WAITING"}`, `{"type": "GET_VERSION"}`, `{"type": "CLEAN_UP"}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use stash_core::Error;

use super::lifecycle::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
    CleanUp,
}

impl ControlMessage {
    /// Parse a message; anything without a known `type` yields `None`.
    pub fn parse(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Reply sent back over the message port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReply {
    /// Current static partition tag (GET_VERSION).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Partitions removed (CLEAN_UP).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<Vec<String>>,
}

impl Worker {
    /// Handle a control message. Unknown messages are ignored and produce no reply.
    pub async fn handle_message(&self, value: &Value) -> Result<Option<ControlReply>, Error> {
        let Some(message) = ControlMessage::parse(value) else {
            tracing::debug!(message = %value, "ignoring unknown control message");
            return Ok(None);
        };

        let reply = match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting().await?;
                ControlReply::default()
            }
            ControlMessage::GetVersion => {
                ControlReply { version: Some(self.router().config().static_cache.clone()), ..Default::default() }
            }
            ControlMessage::CleanUp => {
                let deleted = self.clean_up().await?;
                tracing::info!(deleted = deleted.len(), "cache cleanup complete");
                ControlReply { deleted: Some(deleted), ..Default::default() }
            }
        };
        Ok(Some(reply))
    }
}
