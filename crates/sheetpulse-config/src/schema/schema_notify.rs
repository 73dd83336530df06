//! Alerting and executor endpoint configuration.

use serde::{Deserialize, Serialize};

/// Notifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Window during which a repeated alert for the same category and service is dropped.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Also send an alert for every successful sync.
    #[serde(default)]
    pub notify_on_success: bool,

    /// Slack incoming webhook URL.
    pub slack_webhook: Option<String>,

    /// Telegram bot token.
    pub telegram_bot_token: Option<String>,

    /// Telegram chat ID.
    pub telegram_chat_id: Option<String>,

    /// Generic JSON webhook URL.
    pub webhook_url: Option<String>,
}

fn default_cooldown() -> u64 {
    300
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown(),
            notify_on_success: false,
            slack_webhook: None,
            telegram_bot_token: None,
            telegram_chat_id: None,
            webhook_url: None,
        }
    }
}

/// HTTP sync executor endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Base URL of the executor service.
    pub endpoint: String,

    /// Request timeout in seconds.
    #[serde(default = "default_executor_timeout")]
    pub timeout_secs: u64,

    /// Bearer token sent to the executor service.
    pub auth_token: Option<String>,
}

fn default_executor_timeout() -> u64 {
    300
}
