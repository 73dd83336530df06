//! Cooldown-gated operator alerts.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use sheetpulse_config::NotifyConfig;
use sheetpulse_protocols::{Service, SyncOutcome};

use crate::alerts::{Alert, AlertSeverity};
use crate::manager::AlertManager;

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;

/// Alert families that share a cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertCategory {
    SyncFailure,
    TokenExpired,
    RateLimited,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::SyncFailure => "sync_failure",
            AlertCategory::TokenExpired => "token_expired",
            AlertCategory::RateLimited => "rate_limited",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends operator alerts, suppressing repeats of the same
/// `(category, service)` inside the cooldown window.
pub struct Notifier {
    manager: AlertManager,
    cooldown: Duration,
    notify_on_success: bool,
    last_sent: Mutex<HashMap<(AlertCategory, Service), Instant>>,
}

impl Notifier {
    pub fn new(manager: AlertManager, cooldown: Duration) -> Self {
        Self {
            manager,
            cooldown,
            notify_on_success: false,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(
            AlertManager::from_config(config),
            Duration::from_secs(config.cooldown_secs),
        )
        .with_notify_on_success(config.notify_on_success)
    }

    pub fn with_notify_on_success(mut self, enabled: bool) -> Self {
        self.notify_on_success = enabled;
        self
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Claim the cooldown slot for `(category, service)`.
    fn try_acquire(&self, category: AlertCategory, service: Service) -> bool {
        let now = Instant::now();
        let mut last_sent = self.last_sent.lock();
        if let Some(last) = last_sent.get(&(category, service)) {
            if now.duration_since(*last) < self.cooldown {
                debug!("Suppressing {} alert for {} (cooldown)", category, service);
                return false;
            }
        }
        last_sent.insert((category, service), now);
        true
    }

    async fn dispatch(&self, category: AlertCategory, service: Service, alert: Alert) -> bool {
        if !self.try_acquire(category, service) {
            return false;
        }
        self.manager.send(&alert).await;
        true
    }

    /// Alert on a failed sync. Returns whether the alert was dispatched.
    pub async fn send_sync_failure(&self, tenant_id: &str, service: Service, error: &str) -> bool {
        let alert = Alert::new(
            format!("{} sync failed", service.display_name()),
            error,
            AlertSeverity::Error,
        )
        .with_tenant(tenant_id)
        .with_service(service.display_name());
        self.dispatch(AlertCategory::SyncFailure, service, alert).await
    }

    /// Alert on an expired or revoked credential.
    pub async fn send_token_expired(&self, tenant_id: &str, service: Service) -> bool {
        let alert = Alert::new(
            format!("{} token expired", service.display_name()),
            "The stored credential was rejected. Reconnect the account to resume syncing.",
            AlertSeverity::Critical,
        )
        .with_tenant(tenant_id)
        .with_service(service.display_name());
        self.dispatch(AlertCategory::TokenExpired, service, alert).await
    }

    /// Alert on upstream throttling.
    pub async fn send_rate_limited(&self, tenant_id: &str, service: Service, detail: &str) -> bool {
        let alert = Alert::new(
            format!("{} rate limited", service.display_name()),
            detail,
            AlertSeverity::Warning,
        )
        .with_tenant(tenant_id)
        .with_service(service.display_name());
        self.dispatch(AlertCategory::RateLimited, service, alert).await
    }

    /// Report a successful sync when enabled; never rate limited.
    pub async fn send_sync_success(&self, tenant_id: &str, service: Service, outcome: &SyncOutcome) -> bool {
        if !self.notify_on_success {
            return false;
        }

        let mut message = format!("Sheet {}", outcome.mode.as_str());
        if let Some(row) = outcome.row_number {
            message.push_str(&format!(" at row {}", row));
        }
        message.push_str(&format!(" in {} ms", outcome.duration_ms));

        let mut alert = Alert::new(
            format!("{} sync completed", service.display_name()),
            message,
            AlertSeverity::Info,
        )
        .with_tenant(tenant_id)
        .with_service(service.display_name());
        if let Some(ref metrics) = outcome.metrics {
            alert = alert.with_details(metrics.clone());
        }

        self.manager.send(&alert).await;
        true
    }
}
