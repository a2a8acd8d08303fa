//! sw_event tool implementation.
//!
//! Delivers push, notification-click and background-sync events.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stash_client::Worker;
use stash_client::router::SyncOutcome;

use super::json_result;
use crate::error::ToolError;

/// Input parameters for sw_event tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwEventParams {
    /// One of "push", "notification_click" or "sync".
    pub event: String,

    /// Push data: `{"title": ..., "body": ..., "primaryKey": ...}`.
    #[serde(default)]
    pub payload: Option<Value>,

    /// Action id of the clicked notification button.
    #[serde(default)]
    pub action: Option<String>,

    /// Sync registration tag.
    #[serde(default)]
    pub tag: Option<String>,
}

/// Output structure for sw_event tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwEventOutput {
    Push {
        /// Notification to show; absent when the push carried no data.
        notification: Option<Value>,
    },
    NotificationClick {
        close: bool,
        open_window: Option<String>,
    },
    Sync {
        /// "ignored", "completed" or "failed".
        outcome: String,
    },
}

/// Implementation of the sw_event tool.
pub async fn event_impl(worker: &Worker, params: SwEventParams) -> Result<CallToolResult, McpError> {
    let output = match params.event.as_str() {
        "push" => {
            let notification = worker.handle_push(params.payload.as_ref())?;
            let notification = notification.map(serde_json::to_value).transpose().map_err(ToolError::from)?;
            SwEventOutput::Push { notification }
        }
        "notification_click" => {
            let click = worker.handle_notification_click(params.action.as_deref());
            SwEventOutput::NotificationClick { close: click.close, open_window: click.open_window.map(String::from) }
        }
        "sync" => {
            let tag = params
                .tag
                .as_deref()
                .ok_or_else(|| ToolError::InvalidInput("sync event requires a tag".into()))?;
            let outcome = match worker.handle_sync(tag).await {
                SyncOutcome::Ignored => "ignored",
                SyncOutcome::Completed => "completed",
                SyncOutcome::Failed => "failed",
            };
            SwEventOutput::Sync { outcome: outcome.to_string() }
        }
        other => return Err(ToolError::InvalidInput(format!("unknown event '{other}'")).into()),
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{active_worker, output};
    use serde_json::json;

    fn params(event: &str) -> SwEventParams {
        SwEventParams { event: event.into(), payload: None, action: None, tag: None }
    }

    #[tokio::test]
    async fn test_event_unknown() {
        let (worker, _) = active_worker(&[]).await;
        let err = event_impl(&worker, params("install")).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_event_push() {
        let (worker, _) = active_worker(&[]).await;
        let mut p = params("push");
        p.payload = Some(json!({"title": "Hello", "body": "World"}));

        match output::<SwEventOutput>(&event_impl(&worker, p).await.unwrap()) {
            SwEventOutput::Push { notification: Some(n) } => {
                assert_eq!(n["title"], "Hello");
                assert_eq!(n["options"]["vibrate"], json!([100, 50, 100]));
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_event_push_without_payload() {
        let (worker, _) = active_worker(&[]).await;
        let out: SwEventOutput = output(&event_impl(&worker, params("push")).await.unwrap());
        assert!(matches!(out, SwEventOutput::Push { notification: None }));
    }

    #[tokio::test]
    async fn test_event_notification_click_explore() {
        let (worker, _) = active_worker(&[]).await;
        let mut p = params("notification_click");
        p.action = Some("explore".into());

        let out: SwEventOutput = output(&event_impl(&worker, p).await.unwrap());
        match out {
            SwEventOutput::NotificationClick { close, open_window } => {
                assert!(close);
                assert_eq!(open_window.as_deref(), Some("https://site.test/index.html"));
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_event_sync_requires_tag() {
        let (worker, _) = active_worker(&[]).await;
        assert!(event_impl(&worker, params("sync")).await.is_err());
    }

    #[tokio::test]
    async fn test_event_sync_offline_fails_quietly() {
        let (worker, _) = active_worker(&[]).await;
        let mut p = params("sync");
        p.tag = Some("background-sync".into());

        let out: SwEventOutput = output(&event_impl(&worker, p).await.unwrap());
        assert!(matches!(out, SwEventOutput::Sync { outcome } if outcome == "failed"));
    }
}
