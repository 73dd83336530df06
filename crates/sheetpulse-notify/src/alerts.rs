//! Alert types and the channel trait.

#[cfg(test)]
#[path = "alerts_tests.rs"]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::NotifyError;

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "INFO"),
            AlertSeverity::Warning => write!(f, "WARNING"),
            AlertSeverity::Error => write!(f, "ERROR"),
            AlertSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl AlertSeverity {
    pub fn emoji(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "\u{2705}",
            AlertSeverity::Warning => "\u{26a0}\u{fe0f}",
            AlertSeverity::Error => "\u{274c}",
            AlertSeverity::Critical => "\u{1f6a8}",
        }
    }

    /// Attachment color for Slack.
    pub fn color(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "#36a64f",
            AlertSeverity::Warning => "#f0ad4e",
            AlertSeverity::Error => "#d9534f",
            AlertSeverity::Critical => "#800000",
        }
    }
}

/// An alert message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub timestamp: DateTime<Utc>,
    /// Tenant the alert concerns.
    pub tenant_id: Option<String>,
    /// Service display name.
    pub service: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: AlertSeverity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            timestamp: Utc::now(),
            tenant_id: None,
            service: None,
            details: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn context(&self) -> Option<String> {
        match (&self.service, &self.tenant_id) {
            (Some(service), Some(tenant)) => Some(format!("{} / tenant {}", service, tenant)),
            (Some(service), None) => Some(service.clone()),
            (None, Some(tenant)) => Some(format!("tenant {}", tenant)),
            (None, None) => None,
        }
    }

    /// Plain text rendering.
    pub fn format_text(&self) -> String {
        let mut text = format!(
            "[{}] {} - {}\n{}",
            self.severity,
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.title,
            self.message
        );

        if let Some(context) = self.context() {
            text.push_str(&format!("\nContext: {}", context));
        }

        text
    }

    /// Markdown rendering for chat channels.
    pub fn format_markdown(&self) -> String {
        let mut text = format!(
            "{} *{}* - {}\n\n{}",
            self.severity.emoji(),
            self.title,
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.message
        );

        if let Some(context) = self.context() {
            text.push_str(&format!("\n\n_{}_", context));
        }

        text
    }
}

/// Destination for alerts.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Writes alerts to the tracing log.
pub struct LogChannel;

#[async_trait]
impl AlertChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        let context = alert.context().unwrap_or_default();
        match alert.severity {
            AlertSeverity::Info => info!("[ALERT] {} ({}): {}", alert.title, context, alert.message),
            AlertSeverity::Warning => {
                warn!("[ALERT] {} ({}): {}", alert.title, context, alert.message)
            }
            AlertSeverity::Error | AlertSeverity::Critical => {
                error!("[ALERT] {} ({}): {}", alert.title, context, alert.message)
            }
        }
        Ok(())
    }
}
