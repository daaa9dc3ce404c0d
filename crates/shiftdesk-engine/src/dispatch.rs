//! Notification dispatchers.
//! Supports: HTTP webhook (JSON POST) and a log-only sink for setups without one.

use async_trait::async_trait;
use shiftdesk_core::config::NotifyConfig;
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::traits::{NotificationDispatcher, NotificationKind};
use std::sync::Arc;
use std::time::Duration;

/// Writes notices to the tracing log only.
#[derive(Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<()> {
        tracing::info!("📢 [{}] → {user_id}: {payload}", kind.as_str());
        Ok(())
    }
}

/// Generic HTTP webhook: POST with JSON body.
pub struct WebhookDispatcher {
    url: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>, headers: Vec<(String, String)>, timeout_secs: u64) -> Self {
        Self {
            url: url.into(),
            headers,
            timeout: Duration::from_secs(timeout_secs),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<()> {
        let mut req = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "user_id": user_id,
                "kind": kind.as_str(),
                "payload": payload,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }))
            .timeout(self.timeout);

        for (key, value) in &self.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ShiftdeskError::Notification(format!("Webhook send failed: {e}")))?;

        if resp.status().is_success() {
            tracing::debug!("✅ Webhook notification sent to {}: {user_id}", self.url);
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(ShiftdeskError::Notification(format!(
                "Webhook error {status}: {body}"
            )))
        }
    }
}

/// Webhook when a URL is configured, otherwise log-only.
pub fn create_dispatcher(config: &NotifyConfig) -> Arc<dyn NotificationDispatcher> {
    if config.webhook_url.trim().is_empty() {
        Arc::new(LogDispatcher)
    } else {
        Arc::new(WebhookDispatcher::new(
            config.webhook_url.trim(),
            config.headers.clone(),
            config.timeout_secs,
        ))
    }
}
