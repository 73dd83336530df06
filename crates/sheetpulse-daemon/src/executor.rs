//! HTTP sync executor adapter.
//!
//! Each service is backed by a sidecar that knows the platform API. The
//! daemon POSTs `{service, tenantId, credential, params}` to
//! `<endpoint>/sync` and reads a [`SyncOutcome`] back; credential checks go
//! to `<endpoint>/verify`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use sheetpulse_config::ExecutorConfig;
use sheetpulse_protocols::{DecryptedCredential, ExecutorError, Service, SyncExecutor, SyncOutcome, SyncRequest};

use crate::error::DaemonError;

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

/// [`SyncExecutor`] that delegates to an HTTP sidecar.
pub struct HttpSyncExecutor {
    service: Service,
    base: Url,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpSyncExecutor {
    pub fn new(service: Service, endpoint: &str, timeout: Duration) -> Result<Self, DaemonError> {
        let mut base = Url::parse(endpoint)
            .map_err(|e| DaemonError::InvalidInput(format!("executor endpoint '{}': {}", endpoint, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DaemonError::Startup(format!("HTTP client: {}", e)))?;

        Ok(Self {
            service,
            base,
            auth_token: None,
            client,
        })
    }

    pub fn from_config(service: Service, config: &ExecutorConfig) -> Result<Self, DaemonError> {
        let executor = Self::new(service, &config.endpoint, Duration::from_secs(config.timeout_secs.max(1)))?;
        Ok(match &config.auth_token {
            Some(token) => executor.with_auth_token(token.clone()),
            None => executor,
        })
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    async fn post(&self, route: &str, body: &Value) -> Result<reqwest::Response, ExecutorError> {
        let url = self
            .base
            .join(route)
            .map_err(|e| ExecutorError::Unavailable(e.to_string()))?;

        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExecutorError::Unavailable(format!("{} executor: {}", self.service, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(status_error(status, text))
    }
}

/// Credential JSON as a value; a non-JSON credential is sent as a string.
fn credential_value(credential: &DecryptedCredential) -> Value {
    credential
        .json()
        .unwrap_or_else(|_| Value::String(credential.expose().to_string()))
}

fn status_error(status: StatusCode, body: String) -> ExecutorError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };
    match status {
        StatusCode::UNAUTHORIZED => ExecutorError::TokenExpired(detail),
        StatusCode::TOO_MANY_REQUESTS => ExecutorError::RateLimited(detail),
        s if s.is_server_error() && body.is_empty() => ExecutorError::Unavailable(detail),
        _ => ExecutorError::Failed(detail),
    }
}

#[async_trait]
impl SyncExecutor for HttpSyncExecutor {
    fn service(&self) -> Service {
        self.service
    }

    async fn execute(
        &self,
        credential: &DecryptedCredential,
        request: &SyncRequest,
    ) -> Result<SyncOutcome, ExecutorError> {
        let body = json!({
            "service": self.service,
            "tenantId": request.tenant_id,
            "credential": credential_value(credential),
            "params": {
                "targetDate": request.target_date,
                "destinationOverrides": request.destination_overrides,
            },
        });

        debug!("Calling {} executor for tenant {}", self.service, request.tenant_id);
        let response = self.post("sync", &body).await?;
        response
            .json::<SyncOutcome>()
            .await
            .map_err(|e| ExecutorError::Failed(format!("invalid outcome from {} executor: {}", self.service, e)))
    }

    async fn verify(&self, credential: &DecryptedCredential) -> Result<(), ExecutorError> {
        let body = json!({
            "service": self.service,
            "credential": credential_value(credential),
        });
        self.post("verify", &body).await?;
        Ok(())
    }
}
