//! SQLite-backed audit store.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Row, params, params_from_iter};
use tokio_rusqlite::Connection;

use sheetpulse_protocols::{StoreError, sql};

use crate::entry::{AuditEntry, AuditEvent, AuditQuery};
use crate::store::AuditStore;

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;

/// Create the audit table and its tenant index.
pub fn init_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id TEXT NOT NULL,
            action TEXT NOT NULL,
            service TEXT,
            status TEXT NOT NULL,
            error_message TEXT,
            metadata TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_tenant_created
            ON audit_log(tenant_id, created_at);",
    )
}

fn parse_column<T: std::str::FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let service: Option<String> = row.get(3)?;
    Ok(AuditEntry {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        action: parse_column(row, 2)?,
        service: match service {
            Some(_) => Some(sql::service(row, 3)?),
            None => None,
        },
        status: parse_column(row, 4)?,
        error_message: row.get(5)?,
        metadata: sql::optional_json(row, 6)?,
        created_at: sql::timestamp(row, 7)?,
    })
}

/// Build the tenant-scoped WHERE clause and its bound values.
fn where_clause(tenant_id: &str, filter: &AuditQuery) -> (String, Vec<String>) {
    let mut clause = String::from("WHERE tenant_id = ?1");
    let mut values = vec![tenant_id.to_string()];

    let mut push = |sql_fragment: &str, value: String| {
        values.push(value);
        clause.push_str(&format!(" AND {} ?{}", sql_fragment, values.len()));
    };

    if let Some(action) = filter.action {
        push("action =", action.as_str().to_string());
    }
    if let Some(service) = filter.service {
        push("service =", service.as_str().to_string());
    }
    if let Some(status) = filter.status {
        push("status =", status.as_str().to_string());
    }
    if let Some(since) = filter.since {
        push("created_at >=", sql::format_timestamp(since));
    }
    if let Some(until) = filter.until {
        push("created_at <", sql::format_timestamp(until));
    }

    (clause, values)
}

/// SQLite audit store.
#[derive(Clone)]
pub struct SqliteAuditStore {
    conn: Connection,
}

impl SqliteAuditStore {
    /// Wrap an open connection, creating the table if needed.
    pub async fn new(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| Ok(init_schema(conn)?)).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn append(&self, event: AuditEvent) -> Result<i64, StoreError> {
        let metadata = event.metadata.as_ref().map(|m| m.to_string());
        let created_at = sql::format_timestamp(Utc::now());
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO audit_log
                        (tenant_id, action, service, status, error_message, metadata, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        event.tenant_id,
                        event.action.as_str(),
                        event.service.map(|s| s.as_str()),
                        event.status.as_str(),
                        event.error_message,
                        metadata,
                        created_at,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    async fn query(
        &self,
        tenant_id: &str,
        filter: &AuditQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let (clause, values) = where_clause(tenant_id, filter);
        let sql = format!(
            "SELECT id, tenant_id, action, service, status, error_message, metadata, created_at
             FROM audit_log {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
            clause, limit, offset
        );
        let entries = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(values.iter()), entry_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(entries)
    }
}
