//! Fan-out of alerts to every configured channel.

use std::time::Duration;

use futures::future::join_all;
use tracing::{error, info};

use sheetpulse_config::NotifyConfig;

use crate::alerts::{Alert, AlertChannel, LogChannel};
use crate::channels::{CHANNEL_TIMEOUT, SlackChannel, TelegramChannel, WebhookChannel};
use crate::error::NotifyError;

/// Alert manager.
pub struct AlertManager {
    channels: Vec<Box<dyn AlertChannel>>,
    send_timeout: Duration,
}

impl AlertManager {
    /// A manager with only the log channel.
    pub fn new() -> Self {
        Self {
            channels: vec![Box::new(LogChannel)],
            send_timeout: CHANNEL_TIMEOUT,
        }
    }

    /// A manager with no channels at all.
    pub fn empty() -> Self {
        Self {
            channels: Vec::new(),
            send_timeout: CHANNEL_TIMEOUT,
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        let mut manager = Self::new();

        if let Some(ref webhook_url) = config.slack_webhook {
            if !webhook_url.is_empty() {
                info!("Adding Slack alert channel");
                manager.add_channel(Box::new(SlackChannel::new(webhook_url)));
            }
        }

        if let (Some(bot_token), Some(chat_id)) =
            (&config.telegram_bot_token, &config.telegram_chat_id)
        {
            if !bot_token.is_empty() && !chat_id.is_empty() {
                info!("Adding Telegram alert channel");
                manager.add_channel(Box::new(TelegramChannel::new(bot_token, chat_id)));
            }
        }

        if let Some(ref url) = config.webhook_url {
            if !url.is_empty() {
                info!("Adding webhook alert channel");
                manager.add_channel(Box::new(WebhookChannel::new(url)));
            }
        }

        manager
    }

    /// Deadline applied to each channel's delivery.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn add_channel(&mut self, channel: Box<dyn AlertChannel>) {
        self.channels.push(channel);
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send an alert to all channels concurrently.
    ///
    /// Each channel gets its own deadline; a slow or failing channel does
    /// not delay or stop the rest.
    pub async fn send(&self, alert: &Alert) -> Vec<NotifyError> {
        let deliveries = self.channels.iter().map(|channel| async move {
            match tokio::time::timeout(self.send_timeout, channel.send(alert)).await {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Timeout {
                    channel: channel.name().to_string(),
                    timeout_ms: self.send_timeout.as_millis() as u64,
                }),
            }
        });

        join_all(deliveries)
            .await
            .into_iter()
            .filter_map(Result::err)
            .inspect(|e| error!("Failed to send alert: {}", e))
            .collect()
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}
