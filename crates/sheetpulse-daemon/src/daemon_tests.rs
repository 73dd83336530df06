use super::*;
use serde_json::json;
use sheetpulse_config::ExecutorConfig;
use sheetpulse_protocols::JobStatus;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.database.path = dir.path().join("data/sheetpulse.db").to_string_lossy().to_string();
    config.vault.salt = "daemon-test-salt-00001".to_string();
    config.vault.kdf_iterations = 1_000;
    config.queue.poll_interval_ms = 20;
    config
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within 5s");
}

#[tokio::test]
async fn test_build_creates_database() {
    let dir = TempDir::new().unwrap();
    let daemon = Daemon::build(test_config(&dir)).await.unwrap();

    assert_eq!(daemon.state(), DaemonState::Stopped);
    assert!(dir.path().join("data/sheetpulse.db").exists());
}

#[tokio::test]
async fn test_build_fails_when_database_cannot_open() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let mut config = test_config(&dir);
    config.database.path = blocker.join("sheetpulse.db").to_string_lossy().to_string();

    assert!(matches!(Daemon::build(config).await, Err(DaemonError::Startup(_))));
}

#[tokio::test]
async fn test_build_rejects_unknown_executor() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.executors.insert(
        "tiktok".to_string(),
        ExecutorConfig {
            endpoint: "http://127.0.0.1:9/tiktok".to_string(),
            timeout_secs: 5,
            auth_token: None,
        },
    );

    assert!(matches!(Daemon::build(config).await, Err(DaemonError::InvalidInput(_))));
}

#[tokio::test]
async fn test_run_until_shutdown() {
    let dir = TempDir::new().unwrap();
    let daemon = Arc::new(Daemon::build(test_config(&dir)).await.unwrap());
    let signals = SignalHandler::new();

    let runner = {
        let daemon = daemon.clone();
        let signals = signals.clone();
        tokio::spawn(async move { daemon.run(&signals).await })
    };

    wait_for(|| daemon.is_running()).await;
    assert!(matches!(
        daemon.run(&signals).await,
        Err(DaemonError::InvalidStateTransition { .. })
    ));

    signals.request_shutdown();
    runner.await.unwrap().unwrap();

    assert_eq!(daemon.state(), DaemonState::Stopped);
    assert!(daemon.scheduler().is_shut_down());
    assert!(!daemon.worker_pool().is_running());
}

#[tokio::test]
async fn test_reload_picks_up_new_schedules() {
    let dir = TempDir::new().unwrap();
    let daemon = Arc::new(Daemon::build(test_config(&dir)).await.unwrap());
    let signals = SignalHandler::new();

    let runner = {
        let daemon = daemon.clone();
        let signals = signals.clone();
        tokio::spawn(async move { daemon.run(&signals).await })
    };
    wait_for(|| daemon.is_running()).await;

    daemon
        .scheduler()
        .registry()
        .create("42", Service::Ga4, "30 4 * * *", true, "UTC")
        .await
        .unwrap();
    assert_eq!(daemon.scheduler().active_timer_count(), 0);

    signals.request_reload();
    wait_for(|| daemon.scheduler().active_timer_count() == 1).await;

    signals.request_shutdown();
    runner.await.unwrap().unwrap();
    assert_eq!(daemon.scheduler().active_timer_count(), 0);
}

#[tokio::test]
async fn test_manual_sync_runs_through_executor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meta/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "mode": "append",
            "rowNumber": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.executors.insert(
        "meta".to_string(),
        ExecutorConfig {
            endpoint: format!("{}/meta", server.uri()),
            timeout_secs: 5,
            auth_token: None,
        },
    );
    let daemon = Arc::new(Daemon::build(config).await.unwrap());
    let signals = SignalHandler::new();

    let runner = {
        let daemon = daemon.clone();
        let signals = signals.clone();
        tokio::spawn(async move { daemon.run(&signals).await })
    };
    wait_for(|| daemon.is_running()).await;

    let tenants = daemon.tenant_service();
    tenants
        .save_credential("42", Service::Meta, "Ads", r#"{"access_token":"EAAB-live"}"#)
        .await
        .unwrap();
    let job_id = tenants.trigger_sync("42", Service::Meta, None).await.unwrap();

    let mut status = JobStatus::Pending;
    for _ in 0..250 {
        status = daemon.queue().get(job_id).await.unwrap().unwrap().status;
        if status == JobStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, JobStatus::Completed);

    signals.request_shutdown();
    runner.await.unwrap().unwrap();
}
