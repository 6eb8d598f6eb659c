//! Database schema migrations for SQLite.
//!
//! Versioned: each migration moves the schema from version N to N+1, and the
//! applied versions are recorded in `schema_migrations`.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: running it against an up-to-date database does nothing.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_micros()],
            )?;
            tracing::info!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: the export chain ledger.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE chain_entries (
            case_id TEXT NOT NULL,
            sequence INTEGER NOT NULL CHECK (sequence >= 0),
            checksum BLOB NOT NULL,           -- 32 bytes, SHA-256 of canonical bundle
            prev_checksum BLOB,               -- NULL only for sequence 0
            signature BLOB NOT NULL,          -- 32 bytes, HMAC-SHA256
            appended_at INTEGER NOT NULL,     -- local Unix micros

            PRIMARY KEY (case_id, sequence),
            CHECK ((sequence = 0) = (prev_checksum IS NULL))
        );

        -- The ledger is append-only.
        CREATE TRIGGER chain_entries_no_update
        BEFORE UPDATE ON chain_entries
        BEGIN
            SELECT RAISE(ABORT, 'chain entries are append-only');
        END;

        CREATE TRIGGER chain_entries_no_delete
        BEFORE DELETE ON chain_entries
        BEGIN
            SELECT RAISE(ABORT, 'chain entries are append-only');
        END;
        "#,
    )?;

    Ok(())
}

pub(crate) fn now_micros() -> i64 {
    casechain_core::Timestamp::now().unix_micros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"chain_entries".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_genesis_prev_constraint() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let bad = conn.execute(
            "INSERT INTO chain_entries VALUES ('C1', 0, x'00', x'01', x'02', 0)",
            [],
        );
        assert!(bad.is_err());

        let missing_prev = conn.execute(
            "INSERT INTO chain_entries VALUES ('C1', 1, x'00', NULL, x'02', 0)",
            [],
        );
        assert!(missing_prev.is_err());
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
