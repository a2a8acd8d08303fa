//! Push, notification-click and background-sync events.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use stash_core::Error;

use super::lifecycle::Worker;
use crate::fetch::FetchRequest;

/// Tag of the only sync registration the worker reacts to.
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

const EXPLORE_ACTION: &str = "explore";
const CLOSE_ACTION: &str = "close";

/// Data carried by a push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub primary_key: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// Milliseconds since the Unix epoch.
    pub date_of_arrival: i64,
    pub primary_key: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub body: Option<String>,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

/// Notification to display in response to a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub options: NotificationOptions,
}

/// What the host should do after a notification click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationClick {
    /// The clicked notification is always closed.
    pub close: bool,
    pub open_window: Option<Url>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Ignored,
    Completed,
    Failed,
}

impl Worker {
    /// Build the notification for a push message. No payload, no notification.
    pub fn handle_push(&self, payload: Option<&Value>) -> Result<Option<Notification>, Error> {
        let Some(payload) = payload else {
            return Ok(None);
        };
        let payload: PushPayload = serde_json::from_value(payload.clone())
            .map_err(|e| Error::InvalidInput(format!("invalid push payload: {e}")))?;

        let config = self.router().config();
        let action = |action: &str, title: &str| NotificationAction {
            action: action.to_string(),
            title: title.to_string(),
            icon: config.notification_badge.clone(),
        };

        Ok(Some(Notification {
            title: payload.title,
            options: NotificationOptions {
                body: payload.body,
                icon: config.notification_icon.clone(),
                badge: config.notification_badge.clone(),
                vibrate: vec![100, 50, 100],
                data: NotificationData {
                    date_of_arrival: chrono::Utc::now().timestamp_millis(),
                    primary_key: payload.primary_key,
                },
                actions: vec![action(EXPLORE_ACTION, "View details"), action(CLOSE_ACTION, "Close")],
            },
        }))
    }

    /// `explore` opens the site root; every other action just closes.
    pub fn handle_notification_click(&self, action: Option<&str>) -> NotificationClick {
        let open_window = (action == Some(EXPLORE_ACTION)).then(|| self.router().config().offline_fallback.clone());
        NotificationClick { close: true, open_window }
    }

    /// Refresh the sync URL for the `background-sync` tag; failures are swallowed.
    pub async fn handle_sync(&self, tag: &str) -> SyncOutcome {
        if tag != BACKGROUND_SYNC_TAG {
            return SyncOutcome::Ignored;
        }

        let request = FetchRequest::get(self.router().config().sync_url.clone());
        match self.router().fetcher().fetch(&request).await {
            Ok(_) => {
                tracing::info!(url = %request.url, "background sync complete");
                SyncOutcome::Completed
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "background sync failed");
                SyncOutcome::Failed
            }
        }
    }
}
