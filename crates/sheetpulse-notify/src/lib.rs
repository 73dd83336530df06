//! # SheetPulse Notify
//!
//! Operator alerts for sync failures, expired tokens and rate limiting.
//!
//! Alerts fan out to every configured [`AlertChannel`]. The [`Notifier`]
//! suppresses repeats of the same category for the same service within a
//! cooldown window.

pub mod alerts;
pub mod channels;
pub mod error;
pub mod manager;
pub mod notifier;

pub use alerts::{Alert, AlertChannel, AlertSeverity, LogChannel};
pub use channels::{SlackChannel, TelegramChannel, WebhookChannel};
pub use error::NotifyError;
pub use manager::AlertManager;
pub use notifier::{AlertCategory, Notifier};
