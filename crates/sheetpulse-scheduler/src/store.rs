//! Schedule persistence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use sheetpulse_protocols::StoreError;

use crate::schedule::{Schedule, ScheduleKey};

/// Storage for schedules. At most one row per [`ScheduleKey`].
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Insert a new schedule; [`StoreError::Conflict`] if the key exists.
    async fn insert(&self, schedule: &Schedule) -> Result<(), StoreError>;

    /// Overwrite definition and run fields of the row matching the
    /// schedule's id and tenant. Returns whether a row matched.
    async fn update(&self, schedule: &Schedule) -> Result<bool, StoreError>;

    async fn get(&self, key: &ScheduleKey) -> Result<Option<Schedule>, StoreError>;

    async fn get_by_id(&self, tenant_id: &str, id: &str) -> Result<Option<Schedule>, StoreError>;

    async fn list_all(&self) -> Result<Vec<Schedule>, StoreError>;

    async fn list_enabled(&self) -> Result<Vec<Schedule>, StoreError>;

    /// Enabled schedules whose next run is before `now`.
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError>;

    async fn set_last_run(&self, key: &ScheduleKey, at: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn set_next_run(&self, key: &ScheduleKey, at: Option<DateTime<Utc>>) -> Result<bool, StoreError>;
}

/// In-memory schedule store.
#[derive(Default)]
pub struct MemoryScheduleStore {
    schedules: RwLock<HashMap<ScheduleKey, Schedule>>,
    unavailable: AtomicBool,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("schedule store offline".to_string()));
        }
        Ok(())
    }

    fn sorted(mut schedules: Vec<Schedule>) -> Vec<Schedule> {
        schedules.sort_by(|a, b| a.key().cmp(&b.key()));
        schedules
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn insert(&self, schedule: &Schedule) -> Result<(), StoreError> {
        self.check()?;
        let mut schedules = self.schedules.write().await;
        let key = schedule.key();
        if schedules.contains_key(&key) {
            return Err(StoreError::Conflict(format!("schedule {} already exists", key)));
        }
        schedules.insert(key, schedule.clone());
        Ok(())
    }

    async fn update(&self, schedule: &Schedule) -> Result<bool, StoreError> {
        self.check()?;
        let mut schedules = self.schedules.write().await;
        match schedules.get_mut(&schedule.key()) {
            Some(stored) if stored.id == schedule.id => {
                *stored = schedule.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, key: &ScheduleKey) -> Result<Option<Schedule>, StoreError> {
        self.check()?;
        Ok(self.schedules.read().await.get(key).cloned())
    }

    async fn get_by_id(&self, tenant_id: &str, id: &str) -> Result<Option<Schedule>, StoreError> {
        self.check()?;
        Ok(self
            .schedules
            .read()
            .await
            .values()
            .find(|s| s.id == id && s.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<Schedule>, StoreError> {
        self.check()?;
        Ok(Self::sorted(self.schedules.read().await.values().cloned().collect()))
    }

    async fn list_enabled(&self) -> Result<Vec<Schedule>, StoreError> {
        self.check()?;
        let schedules = self.schedules.read().await;
        Ok(Self::sorted(schedules.values().filter(|s| s.enabled).cloned().collect()))
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError> {
        self.check()?;
        let schedules = self.schedules.read().await;
        Ok(Self::sorted(schedules.values().filter(|s| s.is_due(now)).cloned().collect()))
    }

    async fn set_last_run(&self, key: &ScheduleKey, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.check()?;
        let mut schedules = self.schedules.write().await;
        Ok(schedules
            .get_mut(key)
            .map(|s| {
                s.last_run_at = Some(at);
                s.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn set_next_run(&self, key: &ScheduleKey, at: Option<DateTime<Utc>>) -> Result<bool, StoreError> {
        self.check()?;
        let mut schedules = self.schedules.write().await;
        Ok(schedules
            .get_mut(key)
            .map(|s| {
                s.next_run_at = at;
                s.updated_at = Utc::now();
            })
            .is_some())
    }
}
