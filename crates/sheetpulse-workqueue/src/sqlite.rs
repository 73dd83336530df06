//! SQLite-backed job store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use sheetpulse_protocols::{JobStatus, StoreError, SyncJob, sql};

use crate::store::JobStore;

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;

const JOB_COLUMNS: &str = "id, service, request, status, attempts, max_attempts, run_at, \
     created_at, updated_at, started_at, stalled, last_error";

/// Create the job table.
pub fn init_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sync_jobs (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            tenant_id TEXT NOT NULL,
            service TEXT NOT NULL,
            request TEXT NOT NULL,
            status TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL,
            run_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            started_at TEXT,
            stalled INTEGER NOT NULL DEFAULT 0,
            last_error TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_sync_jobs_ready ON sync_jobs(status, run_at, seq);",
    )
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<SyncJob> {
    let id: String = row.get(0)?;
    let request: String = row.get(2)?;
    let status: String = row.get(3)?;
    Ok(SyncJob {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e.to_string()))?,
        service: sql::service(row, 1)?,
        request: serde_json::from_str(&request).map_err(|e| conversion_error(2, e.to_string()))?,
        status: JobStatus::parse(&status)
            .ok_or_else(|| conversion_error(3, format!("unknown job status '{}'", status)))?,
        attempts: row.get(4)?,
        max_attempts: row.get(5)?,
        run_at: sql::timestamp(row, 6)?,
        created_at: sql::timestamp(row, 7)?,
        updated_at: sql::timestamp(row, 8)?,
        started_at: sql::optional_timestamp(row, 9)?,
        stalled: row.get(10)?,
        last_error: row.get(11)?,
    })
}

/// SQLite job store.
#[derive(Clone)]
pub struct SqliteJobStore {
    conn: Connection,
}

impl SqliteJobStore {
    /// Wrap an open connection, creating the table if needed.
    pub async fn new(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| Ok(init_schema(conn)?)).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &SyncJob) -> Result<(), StoreError> {
        let request = serde_json::to_string(&job.request)
            .map_err(|e| StoreError::Corrupt(format!("job request: {}", e)))?;
        let j = job.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sync_jobs (id, tenant_id, service, request, status, attempts, max_attempts,
                        run_at, created_at, updated_at, started_at, stalled, last_error)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    params![
                        j.id.to_string(),
                        j.request.tenant_id,
                        j.service.as_str(),
                        request,
                        j.status.as_str(),
                        j.attempts,
                        j.max_attempts,
                        sql::format_timestamp(j.run_at),
                        sql::format_timestamp(j.created_at),
                        sql::format_timestamp(j.updated_at),
                        j.started_at.map(sql::format_timestamp),
                        j.stalled,
                        j.last_error,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<SyncJob>, StoreError> {
        let now_str = sql::format_timestamp(now);
        let job = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let claimed = tx
                    .query_row(
                        &format!(
                            "SELECT {} FROM sync_jobs
                             WHERE status = 'pending' AND run_at <= ?1
                             ORDER BY run_at, seq LIMIT 1",
                            JOB_COLUMNS
                        ),
                        params![now_str],
                        job_from_row,
                    )
                    .optional()?;

                let claimed = match claimed {
                    Some(mut job) => {
                        tx.execute(
                            "UPDATE sync_jobs
                             SET status = 'running', started_at = ?2, stalled = 0, updated_at = ?2
                             WHERE id = ?1",
                            params![job.id.to_string(), now_str],
                        )?;
                        job.status = JobStatus::Running;
                        job.started_at = Some(now);
                        job.stalled = false;
                        job.updated_at = now;
                        Some(job)
                    }
                    None => None,
                };
                tx.commit()?;
                Ok(claimed)
            })
            .await?;
        Ok(job)
    }

    async fn update(&self, job: &SyncJob) -> Result<(), StoreError> {
        let j = job.clone();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE sync_jobs
                     SET status = ?2, attempts = ?3, run_at = ?4, updated_at = ?5,
                         started_at = ?6, stalled = ?7, last_error = ?8
                     WHERE id = ?1",
                    params![
                        j.id.to_string(),
                        j.status.as_str(),
                        j.attempts,
                        sql::format_timestamp(j.run_at),
                        sql::format_timestamp(j.updated_at),
                        j.started_at.map(sql::format_timestamp),
                        j.stalled,
                        j.last_error,
                    ],
                )?;
                Ok(changed)
            })
            .await?;

        if changed == 0 {
            return Err(StoreError::NotFound(job.id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SyncJob>, StoreError> {
        let id = id.to_string();
        let job = self
            .conn
            .call(move |conn| {
                let job = conn
                    .query_row(
                        &format!("SELECT {} FROM sync_jobs WHERE id = ?1", JOB_COLUMNS),
                        params![id],
                        job_from_row,
                    )
                    .optional()?;
                Ok(job)
            })
            .await?;
        Ok(job)
    }

    async fn count_pending(&self) -> Result<u64, StoreError> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sync_jobs WHERE status = 'pending'",
                    [],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<SyncJob>, StoreError> {
        let jobs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM sync_jobs WHERE status = ?1 ORDER BY seq",
                    JOB_COLUMNS
                ))?;
                let jobs = stmt
                    .query_map(params![status.as_str()], job_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(jobs)
            })
            .await?;
        Ok(jobs)
    }

    async fn flag_stalled(&self, cutoff: DateTime<Utc>) -> Result<Vec<SyncJob>, StoreError> {
        let cutoff = sql::format_timestamp(cutoff);
        let now = Utc::now();
        let now_str = sql::format_timestamp(now);
        let flagged = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let jobs = {
                    let mut stmt = tx.prepare(&format!(
                        "SELECT {} FROM sync_jobs
                         WHERE status = 'running' AND stalled = 0 AND started_at < ?1
                         ORDER BY seq",
                        JOB_COLUMNS
                    ))?;
                    let jobs = stmt
                        .query_map(params![cutoff], job_from_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    jobs
                };
                for job in &jobs {
                    tx.execute(
                        "UPDATE sync_jobs SET stalled = 1, updated_at = ?2 WHERE id = ?1",
                        params![job.id.to_string(), now_str],
                    )?;
                }
                tx.commit()?;
                Ok(jobs)
            })
            .await?;

        Ok(flagged
            .into_iter()
            .map(|mut job| {
                job.stalled = true;
                job.updated_at = now;
                job
            })
            .collect())
    }

    async fn reset_running(&self) -> Result<usize, StoreError> {
        let now = sql::format_timestamp(Utc::now());
        let count = self
            .conn
            .call(move |conn| {
                let count = conn.execute(
                    "UPDATE sync_jobs
                     SET status = 'pending', started_at = NULL, stalled = 0, updated_at = ?1
                     WHERE status = 'running'",
                    params![now],
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    async fn purge_completed(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let cutoff = sql::format_timestamp(cutoff);
        let purged = self
            .conn
            .call(move |conn| {
                let purged = conn.execute(
                    "DELETE FROM sync_jobs WHERE status = 'completed' AND updated_at < ?1",
                    params![cutoff],
                )?;
                Ok(purged)
            })
            .await?;
        Ok(purged as u64)
    }
}
