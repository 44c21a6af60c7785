//! Parent notification webhook
//!
//! Delivery is best effort. Every failure (no webhook configured, network
//! error, non-2xx answer) is reported in the outcome and logged; `send` never
//! returns an error to the caller.

use rollcall_common::config::NotificationConfig;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::NotificationRow;

/// Result of one webhook delivery attempt
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NotificationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    session_id: Uuid,
    notifications: &'a [NotificationRow],
}

pub struct NotificationDispatcher {
    http_client: reqwest::Client,
    webhook_url: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(config: &NotificationConfig) -> rollcall_common::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                rollcall_common::Error::Config(format!("Failed to build webhook client: {}", e))
            })?;

        Ok(Self {
            http_client,
            webhook_url: config
                .webhook_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// POST the notification lines of one session to the webhook
    pub async fn send(&self, session_id: Uuid, rows: &[NotificationRow]) -> NotificationOutcome {
        let Some(url) = &self.webhook_url else {
            tracing::warn!(session_id = %session_id, "Notification webhook URL not configured");
            return NotificationOutcome::failed("Notification webhook URL not configured");
        };

        let payload = WebhookPayload {
            session_id,
            notifications: rows,
        };

        let response = match self.http_client.post(url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Notification webhook unreachable");
                return NotificationOutcome::failed(e.to_string());
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        if status.is_success() {
            tracing::info!(
                session_id = %session_id,
                notifications = rows.len(),
                "Notifications delivered to webhook"
            );
            NotificationOutcome {
                success: true,
                response: Some(body),
                error: None,
            }
        } else {
            tracing::warn!(
                session_id = %session_id,
                status = status.as_u16(),
                "Notification webhook rejected delivery"
            );
            NotificationOutcome {
                success: false,
                response: Some(body),
                error: Some(format!("Webhook returned HTTP {}", status.as_u16())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_url_is_failed_outcome() {
        let dispatcher = NotificationDispatcher::new(&NotificationConfig {
            webhook_url: Some("   ".to_string()),
            timeout_ms: 1000,
        })
        .unwrap();

        assert!(!dispatcher.is_configured());
        let outcome = dispatcher.send(Uuid::new_v4(), &[]).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("not configured"));
    }
}
