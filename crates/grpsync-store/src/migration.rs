//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system: each migration transforms the schema
//! from version N to N+1 inside one transaction.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, chrono::Utc::now().to_rfc3339()],
            )?;
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

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Local records: one row per record of any schema; the field bag
        -- is serialized JSON, the columns exist for indexing and scans.
        CREATE TABLE records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            schema TEXT NOT NULL,
            fields TEXT NOT NULL,             -- serialized LocalRecord field bag
            deleted INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );

        -- Durable linkage between a local record and a remote identity,
        -- scoped by owning user and remote store.
        CREATE TABLE sync_metadata (
            local_id INTEGER NOT NULL,
            remote_id TEXT NOT NULL,          -- canonical RemoteId string
            schema TEXT NOT NULL,
            version TEXT NOT NULL,            -- RFC3339 watermark of the item
            local_state TEXT NOT NULL,
            remote_state TEXT NOT NULL,
            owner_user_id INTEGER NOT NULL,
            remote_store_id TEXT NOT NULL,
            extra TEXT NOT NULL,              -- ExtensionPayload JSON
            deleted INTEGER NOT NULL DEFAULT 0,

            UNIQUE(local_id, schema, remote_store_id, owner_user_id)
        );

        -- Cross-session mutual exclusion, keyed by (identity, domain).
        CREATE TABLE sync_locks (
            identity TEXT NOT NULL,
            domain TEXT NOT NULL,
            owner TEXT NOT NULL,
            locked_at TEXT NOT NULL,
            PRIMARY KEY (identity, domain)
        );

        -- Per-scope incremental-enumeration watermarks.
        CREATE TABLE sync_watermarks (
            owner_user_id INTEGER NOT NULL,
            remote_store_id TEXT NOT NULL,
            schema TEXT NOT NULL,
            version TEXT NOT NULL,
            PRIMARY KEY (owner_user_id, remote_store_id, schema)
        );

        -- Indexes for common queries
        CREATE INDEX idx_records_schema ON records(schema, deleted);
        CREATE INDEX idx_metadata_scope
            ON sync_metadata(schema, remote_store_id, owner_user_id, deleted);
        CREATE INDEX idx_metadata_remote
            ON sync_metadata(remote_id, schema, remote_store_id, owner_user_id);
        CREATE INDEX idx_locks_owner ON sync_locks(owner);
        "#,
    )?;

    Ok(())
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

        assert!(tables.contains(&"records".to_string()));
        assert!(tables.contains(&"sync_metadata".to_string()));
        assert!(tables.contains(&"sync_locks".to_string()));
        assert!(tables.contains(&"sync_watermarks".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }
}
