//! Configuration validation.

use std::str::FromStr;

use sheetpulse_protocols::Service;

use crate::error::ConfigError;
use crate::schema::{Config, MIN_KDF_ITERATIONS};

/// Upper bound on worker concurrency.
pub const MAX_CONCURRENCY: u32 = 8;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a [`ConfigError`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_vault(config, &mut result);
        Self::validate_queue(config, &mut result);
        Self::validate_scheduler(config, &mut result);
        Self::validate_notify(config, &mut result);
        Self::validate_executors(config, &mut result);

        result
    }

    fn validate_vault(config: &Config, result: &mut ValidationResult) {
        let salt = &config.vault.salt;
        if salt.is_empty() {
            result.add_error(ValidationError::new(
                "vault.salt",
                "salt must be set (e.g. salt = \"${SHEETPULSE_VAULT_SALT}\")",
            ));
        } else if salt.len() < 16 {
            result.add_warning(ValidationWarning::new(
                "vault.salt",
                "salt is shorter than 16 bytes",
            ));
        }

        if config.vault.kdf_iterations < MIN_KDF_ITERATIONS {
            result.add_error(ValidationError::new(
                "vault.kdf_iterations",
                format!("must be at least {}", MIN_KDF_ITERATIONS),
            ));
        }
    }

    fn validate_queue(config: &Config, result: &mut ValidationResult) {
        let queue = &config.queue;

        if queue.concurrency == 0 {
            result.add_error(ValidationError::new(
                "queue.concurrency",
                "concurrency must be greater than 0",
            ));
        } else if queue.concurrency > MAX_CONCURRENCY {
            result.add_error(ValidationError::new(
                "queue.concurrency",
                format!("concurrency must not exceed {}", MAX_CONCURRENCY),
            ));
        } else if queue.concurrency > 1 {
            result.add_warning(ValidationWarning::new(
                "queue.concurrency",
                "with more than one worker, two jobs for the same tenant and service may overlap",
            ));
        }

        if queue.rate_limit_max == 0 {
            result.add_error(ValidationError::new(
                "queue.rate_limit_max",
                "rate_limit_max must be greater than 0",
            ));
        }

        if queue.rate_limit_window_secs == 0 {
            result.add_error(ValidationError::new(
                "queue.rate_limit_window_secs",
                "rate_limit_window_secs must be greater than 0",
            ));
        }

        if queue.max_attempts == 0 {
            result.add_error(ValidationError::new(
                "queue.max_attempts",
                "max_attempts must be greater than 0",
            ));
        }

        if queue.poll_interval_ms == 0 {
            result.add_warning(ValidationWarning::new(
                "queue.poll_interval_ms",
                "a zero poll interval busy-loops the worker pool",
            ));
        }

        if queue.stall_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "queue.stall_timeout_secs",
                "stall_timeout_secs must be greater than 0",
            ));
        }

        if queue.retention_secs == 0 {
            result.add_warning(ValidationWarning::new(
                "queue.retention_secs",
                "completed jobs are never purged",
            ));
        }
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        let tz = &config.scheduler.default_timezone;
        if chrono_tz::Tz::from_str(tz).is_err() {
            result.add_error(ValidationError::new(
                "scheduler.default_timezone",
                format!("unknown IANA timezone '{}'", tz),
            ));
        }

        if config.scheduler.enqueue_retry_delay_secs == 0 {
            result.add_warning(ValidationWarning::new(
                "scheduler.enqueue_retry_delay_secs",
                "enqueue retries will fire immediately",
            ));
        }
    }

    fn validate_notify(config: &Config, result: &mut ValidationResult) {
        let notify = &config.notify;

        if notify.telegram_bot_token.is_some() != notify.telegram_chat_id.is_some() {
            result.add_warning(ValidationWarning::new(
                "notify.telegram_chat_id",
                "Telegram alerts need both telegram_bot_token and telegram_chat_id",
            ));
        }

        if notify.cooldown_secs == 0 {
            result.add_warning(ValidationWarning::new(
                "notify.cooldown_secs",
                "alerts will not be deduplicated",
            ));
        }

        for (path, value) in [
            ("notify.slack_webhook", &notify.slack_webhook),
            ("notify.webhook_url", &notify.webhook_url),
        ] {
            if let Some(url) = value {
                if !is_http_url(url) {
                    result.add_error(ValidationError::new(path, "must be an http(s) URL"));
                }
            }
        }
    }

    fn validate_executors(config: &Config, result: &mut ValidationResult) {
        for (name, executor) in &config.executors {
            let path = format!("executors.{}", name);

            if Service::from_str(name).is_err() {
                result.add_error(ValidationError::new(
                    &path,
                    format!("unknown service '{}'", name),
                ));
            }

            if !is_http_url(&executor.endpoint) {
                result.add_error(ValidationError::new(
                    format!("{}.endpoint", path),
                    "must be an http(s) URL",
                ));
            }

            if executor.timeout_secs == 0 {
                result.add_error(ValidationError::new(
                    format!("{}.timeout_secs", path),
                    "timeout_secs must be greater than 0",
                ));
            }
        }

        if config.executors.is_empty() {
            result.add_warning(ValidationWarning::new(
                "executors",
                "no sync executors configured; every job will fail",
            ));
        }
    }
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
