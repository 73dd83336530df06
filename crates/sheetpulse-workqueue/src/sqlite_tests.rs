use super::*;
use chrono::Duration;
use serde_json::json;
use sheetpulse_protocols::{Service, SyncRequest};
use tempfile::TempDir;

async fn store(dir: &TempDir) -> SqliteJobStore {
    let conn = Connection::open(dir.path().join("jobs.db")).await.unwrap();
    SqliteJobStore::new(conn).await.unwrap()
}

fn job(tenant: &str) -> SyncJob {
    SyncJob::new(Service::Ga4, SyncRequest::new(tenant))
}

#[tokio::test]
async fn test_insert_and_get_round_trips_request() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    let request = SyncRequest::new("42")
        .with_target_date(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        .with_destination_overrides(json!({ "sheetName": "March" }));
    let j = SyncJob::new(Service::Shopify, request.clone()).with_max_attempts(5);

    store.insert(&j).await.unwrap();
    let loaded = store.get(j.id).await.unwrap().unwrap();

    assert_eq!(loaded.request, request);
    assert_eq!(loaded.service, Service::Shopify);
    assert_eq!(loaded.max_attempts, 5);
    assert_eq!(loaded.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_claim_fifo_by_run_at_then_seq() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    let now = Utc::now();

    let mut a = job("a");
    a.run_at = now - Duration::seconds(5);
    let mut b = job("b");
    b.run_at = now - Duration::seconds(30);
    let mut c = job("c");
    c.run_at = b.run_at;
    let mut future = job("future");
    future.run_at = now + Duration::minutes(10);

    for j in [&a, &b, &c, &future] {
        store.insert(j).await.unwrap();
    }

    let mut order = Vec::new();
    while let Some(claimed) = store.claim_next(now).await.unwrap() {
        assert_eq!(claimed.status, JobStatus::Running);
        order.push(claimed.tenant_id().to_string());
    }

    assert_eq!(order, vec!["b", "c", "a"]);
    assert_eq!(store.count_pending().await.unwrap(), 1);
}

#[tokio::test]
async fn test_update_persists_retry_state() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    store.insert(&job("42")).await.unwrap();

    let mut claimed = store.claim_next(Utc::now()).await.unwrap().unwrap();
    claimed.status = JobStatus::Pending;
    claimed.attempts = 1;
    claimed.started_at = None;
    claimed.run_at = Utc::now() + Duration::minutes(1);
    claimed.last_error = Some("Sheet not found".to_string());
    store.update(&claimed).await.unwrap();

    let loaded = store.get(claimed.id).await.unwrap().unwrap();
    assert_eq!(loaded.attempts, 1);
    assert_eq!(loaded.last_error.as_deref(), Some("Sheet not found"));
    assert!(loaded.started_at.is_none());
    assert!(store.claim_next(Utc::now()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_missing_job() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    assert!(matches!(store.update(&job("42")).await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_flag_stalled_and_reset_running() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    for tenant in ["old", "fresh"] {
        let mut j = job(tenant);
        j.run_at = Utc::now() - Duration::hours(3);
        store.insert(&j).await.unwrap();
    }

    store.claim_next(Utc::now() - Duration::hours(2)).await.unwrap();
    store.claim_next(Utc::now()).await.unwrap();

    let flagged = store.flag_stalled(Utc::now() - Duration::minutes(15)).await.unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].tenant_id(), "old");
    assert!(store.get(flagged[0].id).await.unwrap().unwrap().stalled);
    assert!(store.flag_stalled(Utc::now() - Duration::minutes(15)).await.unwrap().is_empty());

    assert_eq!(store.reset_running().await.unwrap(), 2);
    let pending = store.list_by_status(JobStatus::Pending).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|j| !j.stalled && j.started_at.is_none()));
}

#[tokio::test]
async fn test_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let id = {
        let store = store(&dir).await;
        let j = job("42");
        store.insert(&j).await.unwrap();
        j.id
    };

    let reopened = store(&dir).await;
    assert!(reopened.get(id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_purge_completed_deletes_only_old_completed_rows() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    let now = Utc::now();

    let mut old_done = job("old");
    old_done.status = JobStatus::Completed;
    old_done.updated_at = now - Duration::days(10);
    let mut fresh_done = job("fresh");
    fresh_done.status = JobStatus::Completed;
    fresh_done.updated_at = now - Duration::hours(1);
    let mut old_dead = job("dead");
    old_dead.status = JobStatus::Dead;
    old_dead.updated_at = now - Duration::days(10);

    for j in [&old_done, &fresh_done, &old_dead] {
        store.insert(j).await.unwrap();
    }

    assert_eq!(store.purge_completed(now - Duration::days(7)).await.unwrap(), 1);
    assert!(store.get(old_done.id).await.unwrap().is_none());
    assert!(store.get(fresh_done.id).await.unwrap().is_some());
    assert_eq!(store.list_by_status(JobStatus::Dead).await.unwrap().len(), 1);
    assert_eq!(store.purge_completed(now - Duration::days(7)).await.unwrap(), 0);
}
