//! Store schema definitions and migration runner.
//!
//! Migrations are simple SQL strings applied in order. The SQLite
//! `user_version` pragma tracks which migrations have already been applied.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::StoreError;

/// All migrations, in order. Each entry is `(version, description, sql)`.
/// Versions start at 1.
static MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "initial schema",
        r#"
        CREATE TABLE IF NOT EXISTS quotes (
            id            TEXT PRIMARY KEY,
            remote_id     TEXT UNIQUE,
            text          TEXT NOT NULL,
            category      TEXT NOT NULL DEFAULT '',
            last_modified TEXT NOT NULL,
            position      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_quotes_category ON quotes (category);

        CREATE TABLE IF NOT EXISTS conflicts (
            id              TEXT PRIMARY KEY,
            quote_id        TEXT NOT NULL,
            local_text      TEXT NOT NULL,
            local_category  TEXT NOT NULL DEFAULT '',
            remote_id       TEXT NOT NULL,
            remote_text     TEXT NOT NULL,
            remote_category TEXT NOT NULL DEFAULT '',
            status          TEXT NOT NULL DEFAULT 'detected',
            detected_at     TEXT NOT NULL,
            overridden_at   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_conflicts_status ON conflicts (status);

        CREATE TABLE IF NOT EXISTS sync_log (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at    TEXT NOT NULL,
            completed_at  TEXT,
            remote_items  INTEGER NOT NULL DEFAULT 0,
            conflicts     INTEGER NOT NULL DEFAULT 0,
            admitted      INTEGER NOT NULL DEFAULT 0,
            attached      INTEGER NOT NULL DEFAULT 0,
            skipped       INTEGER NOT NULL DEFAULT 0,
            changed       INTEGER NOT NULL DEFAULT 0,
            success       INTEGER NOT NULL DEFAULT 1,
            details       TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_sync_log_started_at ON sync_log (started_at);

        CREATE TABLE IF NOT EXISTS app_state (
            key         TEXT PRIMARY KEY,
            value       TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        "#,
    ),
];

/// Run all pending migrations against `conn`.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;
    info!(
        current_version,
        target_version = MIGRATIONS.last().map(|m| m.0).unwrap_or(0),
        "checking store migrations"
    );

    for &(version, description, sql) in MIGRATIONS {
        if version > current_version {
            info!(version, description, "applying migration");
            conn.execute_batch(sql)
                .map_err(|e| StoreError::MigrationFailed {
                    version,
                    detail: e.to_string(),
                })?;
            set_schema_version(conn, version)?;
            debug!(version, "migration applied successfully");
        }
    }

    Ok(())
}

/// Read the current schema version from the SQLite `user_version` pragma.
fn get_schema_version(conn: &Connection) -> Result<u32, StoreError> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version via the SQLite `user_version` pragma.
fn set_schema_version(conn: &Connection, version: u32) -> Result<(), StoreError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_idempotently() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };

        assert!(tables.contains(&"quotes".to_string()));
        assert!(tables.contains(&"conflicts".to_string()));
        assert!(tables.contains(&"sync_log".to_string()));
        assert!(tables.contains(&"app_state".to_string()));
    }
}
