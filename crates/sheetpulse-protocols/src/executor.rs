//! Sync executor protocol.
//!
//! Executors know how to call one platform's API and write the rows into
//! the tenant's spreadsheet. The orchestrator calls them uniformly and never
//! looks inside the third-party payloads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;
use crate::job::SyncRequest;
use crate::secret::DecryptedCredential;
use crate::service::Service;

/// How the executor wrote to the destination sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// A new row was appended.
    Append,
    /// An existing row for the same date was overwritten.
    Update,
    /// Nothing was written.
    #[default]
    Skip,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Append => "append",
            WriteMode::Update => "update",
            WriteMode::Skip => "skip",
        }
    }
}

/// Result of one executor invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    #[serde(default)]
    pub mode: WriteMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncOutcome {
    /// A successful outcome.
    pub fn success(mode: WriteMode) -> Self {
        Self {
            success: true,
            mode,
            ..Default::default()
        }
    }

    /// A failed outcome carrying the executor's message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_row_number(mut self, row: u64) -> Self {
        self.row_number = Some(row);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Core trait for platform sync implementations.
#[async_trait]
pub trait SyncExecutor: Send + Sync {
    /// Service this executor handles.
    fn service(&self) -> Service;

    /// Pull metrics with the given credential and write them out.
    async fn execute(
        &self,
        credential: &DecryptedCredential,
        request: &SyncRequest,
    ) -> Result<SyncOutcome, ExecutorError>;

    /// Check that a credential is accepted by the platform.
    async fn verify(&self, _credential: &DecryptedCredential) -> Result<(), ExecutorError> {
        Ok(())
    }
}

/// Sub-classification of executor failures. Drives alert content only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TokenExpired,
    RateLimited,
    Generic,
}

const TOKEN_EXPIRED_SIGNALS: &[&str] = &[
    "token expired",
    "token has expired",
    "expired token",
    "invalid_token",
    "invalid_grant",
    "session has expired",
    "error validating access token",
    "unauthorized",
    "401",
];

const RATE_LIMIT_SIGNALS: &[&str] = &[
    "rate limit",
    "ratelimit",
    "rate_limit",
    "too many requests",
    "quota",
    "throttl",
    "429",
];

impl FailureKind {
    /// Classify a free-form error message.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        let oauth_expired = lower.contains("oauth") && lower.contains("expired");
        if oauth_expired || TOKEN_EXPIRED_SIGNALS.iter().any(|s| lower.contains(s)) {
            FailureKind::TokenExpired
        } else if RATE_LIMIT_SIGNALS.iter().any(|s| lower.contains(s)) {
            FailureKind::RateLimited
        } else {
            FailureKind::Generic
        }
    }

    /// Classify an executor error, honouring explicit variants first.
    pub fn of(err: &ExecutorError) -> Self {
        match err {
            ExecutorError::TokenExpired(_) => FailureKind::TokenExpired,
            ExecutorError::RateLimited(_) => FailureKind::RateLimited,
            ExecutorError::Failed(msg) | ExecutorError::Unavailable(msg) => Self::classify(msg),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TokenExpired => "token_expired",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Generic => "generic",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_token_expiry() {
        assert_eq!(
            FailureKind::classify("OAuthException: the session key has expired"),
            FailureKind::TokenExpired
        );
        assert_eq!(
            FailureKind::classify("Error validating access token: Session has expired"),
            FailureKind::TokenExpired
        );
        assert_eq!(FailureKind::classify("HTTP 401 Unauthorized"), FailureKind::TokenExpired);
        assert_eq!(FailureKind::classify("invalid_grant"), FailureKind::TokenExpired);
    }

    #[test]
    fn test_classify_rate_limit() {
        assert_eq!(FailureKind::classify("429 Too Many Requests"), FailureKind::RateLimited);
        assert_eq!(
            FailureKind::classify("User request limit reached: quota exceeded"),
            FailureKind::RateLimited
        );
    }

    #[test]
    fn test_classify_generic() {
        assert_eq!(FailureKind::classify("spreadsheet not found"), FailureKind::Generic);
        assert_eq!(FailureKind::classify(""), FailureKind::Generic);
    }

    #[test]
    fn test_explicit_variants_win() {
        let err = ExecutorError::RateLimited("token expired?".to_string());
        assert_eq!(FailureKind::of(&err), FailureKind::RateLimited);

        let err = ExecutorError::Failed("rate limit hit".to_string());
        assert_eq!(FailureKind::of(&err), FailureKind::RateLimited);
    }

    #[test]
    fn test_outcome_serde() {
        let outcome: SyncOutcome = serde_json::from_str(
            r#"{"success":true,"mode":"update","rowNumber":12,"durationMs":840}"#,
        )
        .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.mode, WriteMode::Update);
        assert_eq!(outcome.row_number, Some(12));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_outcome_builders() {
        let outcome = SyncOutcome::success(WriteMode::Append)
            .with_row_number(3)
            .with_duration_ms(10);
        assert!(outcome.success);
        assert_eq!(outcome.row_number, Some(3));

        let failed = SyncOutcome::failure("boom");
        assert!(!failed.success);
        assert_eq!(failed.mode, WriteMode::Skip);
    }
}
