//! Row decoding helpers shared by the SQLite stores.
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`)
//! so that string comparison in SQL matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use crate::service::Service;

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Format a timestamp for storage.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read a required timestamp column.
pub fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// Read a nullable timestamp column.
pub fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

/// Read a service column.
pub fn service(row: &Row<'_>, idx: usize) -> rusqlite::Result<Service> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

/// Read a nullable JSON column.
pub fn optional_json(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_decode_row() {
        let conn = Connection::open_in_memory().unwrap();
        let (ts, missing, service, json) = conn
            .query_row(
                "SELECT '2024-01-01T20:30:00+00:00', NULL, 'meta', '{\"sheet\":\"Daily\"}'",
                [],
                |row| {
                    Ok((
                        timestamp(row, 0)?,
                        optional_timestamp(row, 1)?,
                        super::service(row, 2)?,
                        optional_json(row, 3)?,
                    ))
                },
            )
            .unwrap();

        assert_eq!(ts.to_rfc3339(), "2024-01-01T20:30:00+00:00");
        assert!(missing.is_none());
        assert_eq!(service, Service::Meta);
        assert_eq!(json.unwrap()["sheet"], "Daily");
    }

    #[test]
    fn test_format_timestamp_sorts_chronologically() {
        let a = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let b = a + chrono::Duration::milliseconds(5);
        assert_eq!(format_timestamp(a), "2024-01-01T00:00:00.000000Z");
        assert!(format_timestamp(a) < format_timestamp(b));
    }

    #[test]
    fn test_bad_service_is_conversion_failure() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT 'myspace'", [], |row| super::service(row, 0))
            .unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(..)));
    }
}
