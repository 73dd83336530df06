//! SQLite-backed credential and service configuration stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tokio_rusqlite::Connection;

use sheetpulse_protocols::sql;
use sheetpulse_protocols::{Service, ServiceConfig, ServiceConfigStore, StoreError};

use crate::credential::Credential;
use crate::schema::init_schema;
use crate::store::CredentialStore;

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;

const CREDENTIAL_COLUMNS: &str = "id, tenant_id, service, label, encrypted_payload, verified, \
     verified_at, deleted_at, created_at, updated_at";

fn credential_from_row(row: &Row<'_>) -> rusqlite::Result<Credential> {
    Ok(Credential {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        service: sql::service(row, 2)?,
        label: row.get(3)?,
        encrypted_payload: row.get(4)?,
        verified: row.get(5)?,
        verified_at: sql::optional_timestamp(row, 6)?,
        deleted_at: sql::optional_timestamp(row, 7)?,
        created_at: sql::timestamp(row, 8)?,
        updated_at: sql::timestamp(row, 9)?,
    })
}

/// SQLite credential store.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    conn: Connection,
}

impl SqliteCredentialStore {
    /// Wrap an open connection, creating the tables if needed.
    pub async fn new(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| Ok(init_schema(conn)?)).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn insert(&self, credential: &Credential) -> Result<(), StoreError> {
        let c = credential.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO credentials ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                        CREDENTIAL_COLUMNS
                    ),
                    params![
                        c.id,
                        c.tenant_id,
                        c.service.as_str(),
                        c.label,
                        c.encrypted_payload,
                        c.verified,
                        c.verified_at.map(sql::format_timestamp),
                        c.deleted_at.map(sql::format_timestamp),
                        sql::format_timestamp(c.created_at),
                        sql::format_timestamp(c.updated_at),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn get(&self, tenant_id: &str, id: &str) -> Result<Option<Credential>, StoreError> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();
        let credential = self
            .conn
            .call(move |conn| {
                let credential = conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM credentials \
                             WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                            CREDENTIAL_COLUMNS
                        ),
                        params![tenant_id, id],
                        credential_from_row,
                    )
                    .optional()?;
                Ok(credential)
            })
            .await?;
        Ok(credential)
    }

    async fn update_payload(
        &self,
        tenant_id: &str,
        id: &str,
        label: &str,
        encrypted_payload: &str,
    ) -> Result<bool, StoreError> {
        let args = (
            tenant_id.to_string(),
            id.to_string(),
            label.to_string(),
            encrypted_payload.to_string(),
            sql::format_timestamp(Utc::now()),
        );
        let changed = self
            .conn
            .call(move |conn| {
                let (tenant_id, id, label, payload, now) = args;
                let changed = conn.execute(
                    "UPDATE credentials
                     SET label = ?3, encrypted_payload = ?4, verified = 0, verified_at = NULL, updated_at = ?5
                     WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                    params![tenant_id, id, label, payload, now],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    async fn mark_verified(
        &self,
        tenant_id: &str,
        id: &str,
        verified: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();
        let at = sql::format_timestamp(at);
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE credentials SET verified = ?3, verified_at = ?4, updated_at = ?4
                     WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                    params![tenant_id, id, verified, at],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    async fn soft_delete(&self, tenant_id: &str, id: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();
        let at = sql::format_timestamp(at);
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE credentials SET deleted_at = ?3, updated_at = ?3
                     WHERE tenant_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                    params![tenant_id, id, at],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<Credential>, StoreError> {
        let tenant_id = tenant_id.to_string();
        let list = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM credentials
                     WHERE tenant_id = ?1 AND deleted_at IS NULL
                     ORDER BY created_at",
                    CREDENTIAL_COLUMNS
                ))?;
                let list = stmt
                    .query_map([tenant_id], credential_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(list)
            })
            .await?;
        Ok(list)
    }
}

fn service_config_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceConfig> {
    Ok(ServiceConfig {
        tenant_id: row.get(0)?,
        service: sql::service(row, 1)?,
        credential_id: row.get(2)?,
        enabled: row.get(3)?,
        destination: sql::optional_json(row, 4)?,
        created_at: sql::timestamp(row, 5)?,
        updated_at: sql::timestamp(row, 6)?,
    })
}

/// SQLite service configuration store.
#[derive(Clone)]
pub struct SqliteServiceConfigStore {
    conn: Connection,
}

impl SqliteServiceConfigStore {
    /// Wrap an open connection, creating the tables if needed.
    pub async fn new(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| Ok(init_schema(conn)?)).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ServiceConfigStore for SqliteServiceConfigStore {
    async fn upsert(&self, config: &ServiceConfig) -> Result<(), StoreError> {
        let c = config.clone();
        let destination = c
            .destination
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO service_configs
                        (tenant_id, service, credential_id, enabled, destination, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(tenant_id, service) DO UPDATE SET
                        credential_id = excluded.credential_id,
                        enabled = excluded.enabled,
                        destination = excluded.destination,
                        updated_at = excluded.updated_at",
                    params![
                        c.tenant_id,
                        c.service.as_str(),
                        c.credential_id,
                        c.enabled,
                        destination,
                        sql::format_timestamp(c.created_at),
                        sql::format_timestamp(c.updated_at),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn get(&self, tenant_id: &str, service: Service) -> Result<Option<ServiceConfig>, StoreError> {
        let tenant_id = tenant_id.to_string();
        let config = self
            .conn
            .call(move |conn| {
                let config = conn
                    .query_row(
                        "SELECT tenant_id, service, credential_id, enabled, destination, created_at, updated_at
                         FROM service_configs WHERE tenant_id = ?1 AND service = ?2",
                        params![tenant_id, service.as_str()],
                        service_config_from_row,
                    )
                    .optional()?;
                Ok(config)
            })
            .await?;
        Ok(config)
    }

    async fn set_enabled(&self, tenant_id: &str, service: Service, enabled: bool) -> Result<bool, StoreError> {
        let tenant_id = tenant_id.to_string();
        let now = sql::format_timestamp(Utc::now());
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE service_configs SET enabled = ?3, updated_at = ?4
                     WHERE tenant_id = ?1 AND service = ?2",
                    params![tenant_id, service.as_str(), enabled, now],
                )?;
                Ok(changed)
            })
            .await?;
        Ok(changed > 0)
    }

    async fn enabled_credential(&self, tenant_id: &str, service: Service) -> Result<Option<String>, StoreError> {
        let tenant_id = tenant_id.to_string();
        let id = self
            .conn
            .call(move |conn| {
                let id = conn
                    .query_row(
                        "SELECT credential_id FROM service_configs
                         WHERE tenant_id = ?1 AND service = ?2 AND enabled = 1",
                        params![tenant_id, service.as_str()],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }
}
