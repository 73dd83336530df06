//! Webhook-based alert channels.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::alerts::{Alert, AlertChannel};
use crate::error::NotifyError;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Upper bound for one delivery attempt, connect included.
pub const CHANNEL_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(CHANNEL_TIMEOUT)
        .connect_timeout(CHANNEL_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            // The manager still bounds each send with its own deadline.
            warn!("Falling back to default HTTP client for alerts: {}", e);
            reqwest::Client::new()
        })
}

async fn post_json(
    client: &reqwest::Client,
    channel: &str,
    url: &str,
    payload: &serde_json::Value,
) -> Result<(), NotifyError> {
    let response = client
        .post(url)
        .json(payload)
        .send()
        .await
        .map_err(|e| NotifyError::request(channel, e))?;

    if response.status().is_success() {
        debug!("{} alert sent successfully", channel);
        Ok(())
    } else {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            channel: channel.to_string(),
            status,
            body,
        })
    }
}

/// Slack incoming webhook channel.
pub struct SlackChannel {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            client: http_client(),
        }
    }
}

#[async_trait]
impl AlertChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        let mut fields = Vec::new();
        if let Some(ref service) = alert.service {
            fields.push(serde_json::json!({ "title": "Service", "value": service, "short": true }));
        }
        if let Some(ref tenant) = alert.tenant_id {
            fields.push(serde_json::json!({ "title": "Tenant", "value": tenant, "short": true }));
        }
        if let Some(obj) = alert.details.as_ref().and_then(|d| d.as_object()) {
            fields.extend(obj.iter().map(|(k, v)| {
                serde_json::json!({ "title": k, "value": v.to_string(), "short": true })
            }));
        }

        let payload = serde_json::json!({
            "attachments": [{
                "color": alert.severity.color(),
                "title": format!("{} {}", alert.severity.emoji(), alert.title),
                "text": alert.message,
                "footer": "SheetPulse",
                "ts": alert.timestamp.timestamp(),
                "fields": fields,
            }]
        });

        post_json(&self.client, self.name(), &self.webhook_url, &payload).await
    }
}

/// Telegram bot channel.
pub struct TelegramChannel {
    bot_token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API.to_string(),
            client: http_client(),
        }
    }

    /// Point the channel at a different Bot API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl AlertChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": alert.format_markdown(),
            "parse_mode": "Markdown"
        });

        post_json(&self.client, self.name(), &url, &payload).await
    }
}

/// Generic JSON webhook; the body is the serialized [`Alert`].
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: http_client(),
        }
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        let payload = serde_json::to_value(alert).map_err(|e| NotifyError::request(self.name(), e))?;
        post_json(&self.client, self.name(), &self.url, &payload).await
    }
}
