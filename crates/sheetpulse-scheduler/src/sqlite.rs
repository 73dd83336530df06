//! SQLite-backed schedule store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tokio_rusqlite::Connection;

use sheetpulse_protocols::{StoreError, sql};

use crate::schedule::{Schedule, ScheduleKey};
use crate::store::ScheduleStore;

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;

const SCHEDULE_COLUMNS: &str = "id, tenant_id, service, cron_expression, enabled, timezone, \
     last_run_at, next_run_at, created_at, updated_at";

/// Create the schedules table.
pub fn init_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schedules (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            service TEXT NOT NULL,
            cron_expression TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            timezone TEXT NOT NULL DEFAULT 'UTC',
            last_run_at TEXT,
            next_run_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (tenant_id, service)
        );
        CREATE INDEX IF NOT EXISTS idx_schedules_due ON schedules(enabled, next_run_at);",
    )
}

fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        service: sql::service(row, 2)?,
        cron_expression: row.get(3)?,
        enabled: row.get(4)?,
        timezone: row.get(5)?,
        last_run_at: sql::optional_timestamp(row, 6)?,
        next_run_at: sql::optional_timestamp(row, 7)?,
        created_at: sql::timestamp(row, 8)?,
        updated_at: sql::timestamp(row, 9)?,
    })
}

/// SQLite schedule store.
#[derive(Clone)]
pub struct SqliteScheduleStore {
    conn: Connection,
}

impl SqliteScheduleStore {
    /// Wrap an open connection, creating the table if needed.
    pub async fn new(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| Ok(init_schema(conn)?)).await?;
        Ok(Self { conn })
    }

    async fn query_many(&self, filter: &'static str, bind: Option<String>) -> Result<Vec<Schedule>, StoreError> {
        let schedules = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM schedules {} ORDER BY tenant_id, service",
                    SCHEDULE_COLUMNS, filter
                ))?;
                let rows = match bind {
                    Some(value) => stmt.query_map(params![value], schedule_from_row)?,
                    None => stmt.query_map([], schedule_from_row)?,
                };
                let schedules = rows.collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(schedules)
            })
            .await?;
        Ok(schedules)
    }
}

#[async_trait]
impl ScheduleStore for SqliteScheduleStore {
    async fn insert(&self, schedule: &Schedule) -> Result<(), StoreError> {
        let s = schedule.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO schedules ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                        SCHEDULE_COLUMNS
                    ),
                    params![
                        s.id,
                        s.tenant_id,
                        s.service.as_str(),
                        s.cron_expression,
                        s.enabled,
                        s.timezone,
                        s.last_run_at.map(sql::format_timestamp),
                        s.next_run_at.map(sql::format_timestamp),
                        sql::format_timestamp(s.created_at),
                        sql::format_timestamp(s.updated_at),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn update(&self, schedule: &Schedule) -> Result<bool, StoreError> {
        let s = schedule.clone();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE schedules
                     SET cron_expression = ?3, enabled = ?4, timezone = ?5,
                         last_run_at = ?6, next_run_at = ?7, updated_at = ?8
                     WHERE id = ?1 AND tenant_id = ?2",
                    params![
                        s.id,
                        s.tenant_id,
                        s.cron_expression,
                        s.enabled,
                        s.timezone,
                        s.last_run_at.map(sql::format_timestamp),
                        s.next_run_at.map(sql::format_timestamp),
                        sql::format_timestamp(s.updated_at),
                    ],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    async fn get(&self, key: &ScheduleKey) -> Result<Option<Schedule>, StoreError> {
        let key = key.clone();
        let schedule = self
            .conn
            .call(move |conn| {
                let schedule = conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM schedules WHERE tenant_id = ?1 AND service = ?2",
                            SCHEDULE_COLUMNS
                        ),
                        params![key.tenant_id, key.service.as_str()],
                        schedule_from_row,
                    )
                    .optional()?;
                Ok(schedule)
            })
            .await?;
        Ok(schedule)
    }

    async fn get_by_id(&self, tenant_id: &str, id: &str) -> Result<Option<Schedule>, StoreError> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();
        let schedule = self
            .conn
            .call(move |conn| {
                let schedule = conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM schedules WHERE id = ?1 AND tenant_id = ?2",
                            SCHEDULE_COLUMNS
                        ),
                        params![id, tenant_id],
                        schedule_from_row,
                    )
                    .optional()?;
                Ok(schedule)
            })
            .await?;
        Ok(schedule)
    }

    async fn list_all(&self) -> Result<Vec<Schedule>, StoreError> {
        self.query_many("", None).await
    }

    async fn list_enabled(&self) -> Result<Vec<Schedule>, StoreError> {
        self.query_many("WHERE enabled = 1", None).await
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError> {
        self.query_many(
            "WHERE enabled = 1 AND next_run_at IS NOT NULL AND next_run_at < ?1",
            Some(sql::format_timestamp(now)),
        )
        .await
    }

    async fn set_last_run(&self, key: &ScheduleKey, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let key = key.clone();
        let at = sql::format_timestamp(at);
        let now = sql::format_timestamp(Utc::now());
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE schedules SET last_run_at = ?3, updated_at = ?4
                     WHERE tenant_id = ?1 AND service = ?2",
                    params![key.tenant_id, key.service.as_str(), at, now],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    async fn set_next_run(&self, key: &ScheduleKey, at: Option<DateTime<Utc>>) -> Result<bool, StoreError> {
        let key = key.clone();
        let at = at.map(sql::format_timestamp);
        let now = sql::format_timestamp(Utc::now());
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE schedules SET next_run_at = ?3, updated_at = ?4
                     WHERE tenant_id = ?1 AND service = ?2",
                    params![key.tenant_id, key.service.as_str(), at, now],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }
}
