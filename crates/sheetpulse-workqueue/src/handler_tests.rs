use super::*;
use parking_lot::Mutex;
use sheetpulse_audit::{AuditStatus, MemoryAuditStore};
use sheetpulse_notify::{Alert, AlertChannel, AlertManager, NotifyError};
use sheetpulse_protocols::{
    DecryptedCredential, MemoryServiceConfigStore, Service, ServiceConfig, ServiceConfigStore,
    SyncExecutor, SyncRequest, WriteMode,
};
use sheetpulse_vault::{Credential, CredentialStore, CredentialVault, MemoryCredentialStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone, Default)]
struct RecordingChannel {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

#[async_trait]
impl AlertChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.alerts.lock().push(alert.clone());
        Ok(())
    }
}

enum Script {
    Succeed,
    Fail(&'static str),
    Expired,
}

struct StubExecutor {
    service: Service,
    script: Script,
    calls: AtomicUsize,
    seen_credential: Mutex<Option<String>>,
}

impl StubExecutor {
    fn new(service: Service, script: Script) -> Arc<Self> {
        Arc::new(Self {
            service,
            script,
            calls: AtomicUsize::new(0),
            seen_credential: Mutex::new(None),
        })
    }
}

#[async_trait]
impl SyncExecutor for StubExecutor {
    fn service(&self) -> Service {
        self.service
    }

    async fn execute(
        &self,
        credential: &DecryptedCredential,
        _request: &SyncRequest,
    ) -> Result<SyncOutcome, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_credential.lock() = Some(credential.expose().to_string());
        match self.script {
            Script::Succeed => Ok(SyncOutcome::success(WriteMode::Append).with_row_number(7)),
            Script::Fail(msg) => Err(ExecutorError::Failed(msg.to_string())),
            Script::Expired => Err(ExecutorError::TokenExpired("session expired".to_string())),
        }
    }
}

struct Fixture {
    configs: Arc<MemoryServiceConfigStore>,
    credentials: Arc<MemoryCredentialStore>,
    vault: Arc<CredentialVault>,
    audit_store: Arc<MemoryAuditStore>,
    alerts: RecordingChannel,
    handler: SyncJobHandler,
}

fn fixture(executor: Option<Arc<StubExecutor>>) -> Fixture {
    let configs = Arc::new(MemoryServiceConfigStore::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let vault = Arc::new(CredentialVault::with_iterations("handler-test-salt-0001", 1_000));
    let resolver = Arc::new(CredentialResolver::new(
        configs.clone(),
        credentials.clone(),
        vault.clone(),
    ));

    let mut registry = ExecutorRegistry::new();
    if let Some(executor) = executor {
        registry.register(executor);
    }

    let audit_store = Arc::new(MemoryAuditStore::new());
    let alerts = RecordingChannel::default();
    let mut manager = AlertManager::empty();
    manager.add_channel(Box::new(alerts.clone()));
    let notifier = Arc::new(Notifier::new(manager, Duration::from_secs(300)));

    let handler = SyncJobHandler::new(
        resolver,
        Arc::new(registry),
        AuditLog::new(audit_store.clone()),
        notifier,
    );

    Fixture {
        configs,
        credentials,
        vault,
        audit_store,
        alerts,
        handler,
    }
}

async fn connect(f: &Fixture, tenant: &str, service: Service, secret: &str) {
    let blob = f.vault.encrypt(secret, tenant).unwrap();
    let credential = Credential::new(tenant, service, "primary", blob);
    f.credentials.insert(&credential).await.unwrap();
    f.configs
        .upsert(&ServiceConfig::new(tenant, service, credential.id.clone()))
        .await
        .unwrap();
}

fn job(tenant: &str, service: Service) -> SyncJob {
    SyncJob::new(service, SyncRequest::new(tenant))
}

#[tokio::test]
async fn test_success_audits_completion() {
    let executor = StubExecutor::new(Service::Meta, Script::Succeed);
    let f = fixture(Some(executor.clone()));
    connect(&f, "42", Service::Meta, r#"{"access_token":"EAAB"}"#).await;

    let outcome = f.handler.handle(&job("42", Service::Meta)).await.unwrap();

    assert_eq!(outcome.row_number, Some(7));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        executor.seen_credential.lock().as_deref(),
        Some(r#"{"access_token":"EAAB"}"#)
    );

    let entries = f.audit_store.all().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::WorkflowCompleted);
    assert_eq!(entries[0].status, AuditStatus::Success);
    assert_eq!(entries[0].metadata.as_ref().unwrap()["mode"], "append");
    assert!(f.alerts.alerts.lock().is_empty());
}

#[tokio::test]
async fn test_no_configuration_never_calls_executor() {
    let executor = StubExecutor::new(Service::Meta, Script::Succeed);
    let f = fixture(Some(executor.clone()));

    let err = f.handler.handle(&job("42", Service::Meta)).await.unwrap_err();

    assert!(matches!(err, JobError::NoConfiguration { .. }));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 0);

    let entries = f.audit_store.all().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::WorkflowFailed);
    assert_eq!(entries[0].status, AuditStatus::Failure);
    assert_eq!(entries[0].service, Some(Service::Meta));
}

#[tokio::test]
async fn test_undecryptable_credential() {
    let executor = StubExecutor::new(Service::Ga4, Script::Succeed);
    let f = fixture(Some(executor.clone()));
    let credential = Credential::new("42", Service::Ga4, "broken", "not-a-blob".to_string());
    f.credentials.insert(&credential).await.unwrap();
    f.configs
        .upsert(&ServiceConfig::new("42", Service::Ga4, credential.id.clone()))
        .await
        .unwrap();

    let err = f.handler.handle(&job("42", Service::Ga4)).await.unwrap_err();

    assert!(matches!(err, JobError::Decryption));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_executor_is_generic_failure() {
    let f = fixture(None);
    connect(&f, "42", Service::Shopify, "{}").await;

    let err = f.handler.handle(&job("42", Service::Shopify)).await.unwrap_err();
    assert!(matches!(
        err,
        JobError::ExecutorFailure {
            kind: FailureKind::Generic,
            ..
        }
    ));
}

#[tokio::test]
async fn test_failure_message_is_redacted() {
    let executor = StubExecutor::new(
        Service::Meta,
        Script::Fail("GET /insights?access_token=EAABsecret failed: Sheet not found"),
    );
    let f = fixture(Some(executor));
    connect(&f, "42", Service::Meta, "{}").await;

    let err = f.handler.handle(&job("42", Service::Meta)).await.unwrap_err();

    assert!(!err.to_string().contains("EAABsecret"));
    let entries = f.audit_store.all().await;
    let message = entries[0].error_message.as_deref().unwrap();
    assert!(!message.contains("EAABsecret"));
    assert!(message.contains("Sheet not found"));

    let alerts = f.alerts.alerts.lock();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Meta Ads sync failed");
}

#[tokio::test]
async fn test_token_expiry_routes_to_token_alert() {
    let executor = StubExecutor::new(Service::Ga4, Script::Expired);
    let f = fixture(Some(executor));
    connect(&f, "42", Service::Ga4, "{}").await;

    let err = f.handler.handle(&job("42", Service::Ga4)).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::TokenExpired);

    let alerts = f.alerts.alerts.lock();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Google Analytics 4 token expired");
}

#[tokio::test]
async fn test_rate_limit_classified_from_message() {
    let executor = StubExecutor::new(Service::Shopify, Script::Fail("HTTP 429 Too Many Requests"));
    let f = fixture(Some(executor));
    connect(&f, "42", Service::Shopify, "{}").await;

    let err = f.handler.handle(&job("42", Service::Shopify)).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::RateLimited);
    assert_eq!(f.alerts.alerts.lock()[0].title, "Shopify rate limited");
}

#[tokio::test]
async fn test_repeated_failures_alert_once() {
    let executor = StubExecutor::new(Service::Meta, Script::Fail("Sheet not found"));
    let f = fixture(Some(executor));
    connect(&f, "42", Service::Meta, "{}").await;

    for _ in 0..3 {
        let _ = f.handler.handle(&job("42", Service::Meta)).await;
    }

    assert_eq!(f.alerts.alerts.lock().len(), 1);
    assert_eq!(f.audit_store.len().await, 3);
}
