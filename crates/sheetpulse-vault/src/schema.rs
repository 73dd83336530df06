//! Database schema for credentials and service configuration.

use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Initialize the vault tables.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS credentials (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    service TEXT NOT NULL,
    label TEXT NOT NULL,
    encrypted_payload TEXT NOT NULL,
    verified INTEGER NOT NULL DEFAULT 0,
    verified_at TEXT,
    deleted_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_credentials_tenant ON credentials(tenant_id, service);

CREATE TABLE IF NOT EXISTS service_configs (
    tenant_id TEXT NOT NULL,
    service TEXT NOT NULL,
    credential_id TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    destination TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (tenant_id, service)
);
"#;
