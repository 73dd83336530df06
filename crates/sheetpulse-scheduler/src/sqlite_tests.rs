use super::*;
use chrono::Duration;
use sheetpulse_protocols::Service;
use tempfile::TempDir;

async fn store(dir: &TempDir) -> SqliteScheduleStore {
    let conn = Connection::open(dir.path().join("schedules.db")).await.unwrap();
    SqliteScheduleStore::new(conn).await.unwrap()
}

#[tokio::test]
async fn test_insert_and_get() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    let mut schedule = Schedule::new("42", Service::Meta, "0 9 * * 1-5", "Asia/Kolkata");
    schedule.next_run_at = Some(Utc::now() + Duration::hours(3));

    store.insert(&schedule).await.unwrap();

    let loaded = store.get(&schedule.key()).await.unwrap().unwrap();
    assert_eq!(loaded.id, schedule.id);
    assert_eq!(loaded.cron_expression, "0 9 * * 1-5");
    assert_eq!(loaded.timezone, "Asia/Kolkata");
    assert!(loaded.enabled);
    assert_eq!(
        loaded.next_run_at.map(sql::format_timestamp),
        schedule.next_run_at.map(sql::format_timestamp)
    );

    let by_id = store.get_by_id("42", &schedule.id).await.unwrap();
    assert!(by_id.is_some());
    assert!(store.get_by_id("7", &schedule.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_key_is_conflict() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    store
        .insert(&Schedule::new("42", Service::Ga4, "0 2 * * *", "UTC"))
        .await
        .unwrap();

    let err = store
        .insert(&Schedule::new("42", Service::Ga4, "0 3 * * *", "UTC"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    store
        .insert(&Schedule::new("42", Service::Shopify, "0 3 * * *", "UTC"))
        .await
        .unwrap();
    assert_eq!(store.list_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_scoped_by_tenant() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    let mut schedule = Schedule::new("42", Service::Meta, "0 2 * * *", "UTC");
    store.insert(&schedule).await.unwrap();

    schedule.cron_expression = "30 6 * * *".to_string();
    schedule.enabled = false;
    assert!(store.update(&schedule).await.unwrap());

    let loaded = store.get(&schedule.key()).await.unwrap().unwrap();
    assert_eq!(loaded.cron_expression, "30 6 * * *");
    assert!(!loaded.enabled);

    let mut foreign = schedule.clone();
    foreign.tenant_id = "7".to_string();
    assert!(!store.update(&foreign).await.unwrap());
}

#[tokio::test]
async fn test_list_enabled_and_due() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    let now = Utc::now();

    let mut missed = Schedule::new("1", Service::Ga4, "0 2 * * *", "UTC");
    missed.next_run_at = Some(now - Duration::hours(1));
    let mut future = Schedule::new("2", Service::Ga4, "0 2 * * *", "UTC");
    future.next_run_at = Some(now + Duration::hours(1));
    let mut disabled = Schedule::new("3", Service::Ga4, "0 2 * * *", "UTC");
    disabled.enabled = false;
    disabled.next_run_at = Some(now - Duration::hours(1));

    for s in [&missed, &future, &disabled] {
        store.insert(s).await.unwrap();
    }

    let enabled = store.list_enabled().await.unwrap();
    assert_eq!(enabled.len(), 2);

    let due = store.list_due(now).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].tenant_id, "1");
}

#[tokio::test]
async fn test_set_run_times() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    let schedule = Schedule::new("42", Service::Shopify, "0 2 * * *", "UTC");
    store.insert(&schedule).await.unwrap();
    let key = schedule.key();
    let now = Utc::now();

    assert!(store.set_last_run(&key, now).await.unwrap());
    assert!(store.set_next_run(&key, Some(now + Duration::days(1))).await.unwrap());

    let loaded = store.get(&key).await.unwrap().unwrap();
    assert!(loaded.last_run_at.is_some());
    assert!(loaded.next_run_at.unwrap() > now);

    assert!(store.set_next_run(&key, None).await.unwrap());
    assert!(store.get(&key).await.unwrap().unwrap().next_run_at.is_none());

    let missing = ScheduleKey::new("nobody", Service::Shopify);
    assert!(!store.set_last_run(&missing, now).await.unwrap());
}
