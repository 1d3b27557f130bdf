//! Database schema and migrations.
//!
//! Bookkeeping tables are fixed; record tables are created lazily, one per
//! tag, from a single DDL template. Table names reaching this module must
//! already have passed through [`crate::ident::table_name_for`].

use rusqlite::Connection;

use crate::error::Result;
use crate::ident::ENVIRONMENT_TABLE;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the bookkeeping schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        // Fresh database - create bookkeeping tables
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if version < SCHEMA_VERSION {
        // Run migrations
        migrate(conn, version)?;
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    // Check if the schema_version table exists
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

/// Create the initial bookkeeping schema (version 1).
fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        -- One row per record table; the source of truth for enumerating
        -- existing tables. tag_key is NULL for the shared environment table.
        CREATE TABLE IF NOT EXISTS table_metadata (
            table_name TEXT PRIMARY KEY,
            tag_key TEXT,
            row_count INTEGER NOT NULL DEFAULT 0,
            kinds_seen TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            last_updated_at INTEGER NOT NULL
        );
        "#,
    )?;

    Ok(())
}

/// Create a per-tag record table and its indexes.
///
/// Idempotent. One fixed column set serves all non-environment kinds.
pub fn create_record_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            tag_key TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            rssi INTEGER,
            temperature REAL,
            battery_percentage INTEGER,
            peer_key TEXT,
            distance REAL,
            weight REAL,
            raw_payload TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_time ON {table}(timestamp);
        CREATE INDEX IF NOT EXISTS idx_{table}_kind ON {table}(kind);
        CREATE INDEX IF NOT EXISTS idx_{table}_created ON {table}(created_at);
        "#
    ))?;

    Ok(())
}

/// Create the shared environment table and its indexes.
///
/// Environment records have no owning tag, so the column set is reduced.
pub fn create_environment_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            temperature REAL,
            raw_payload TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_time ON {table}(timestamp);
        CREATE INDEX IF NOT EXISTS idx_{table}_kind ON {table}(kind);
        CREATE INDEX IF NOT EXISTS idx_{table}_created ON {table}(created_at);
        "#,
        table = ENVIRONMENT_TABLE
    ))?;

    Ok(())
}

/// Run migrations from old_version to current.
fn migrate(conn: &Connection, old_version: i32) -> Result<()> {
    // Add future migrations here
    // if old_version < 2 { migrate_to_v2(conn)?; }

    let _ = old_version; // Suppress unused warning
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_initialize_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let tables = table_names(&conn);
        assert!(tables.contains(&"table_metadata".to_string()));
        assert!(tables.contains(&"schema_version".to_string()));
        // Record tables are lazy; none exist yet
        assert!(!tables.iter().any(|t| t.starts_with("tag_")));
    }

    #[test]
    fn test_schema_version_tracking() {
        let conn = Connection::open_in_memory().unwrap();

        // Fresh database should have version 0
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        // After initialization, should have current version
        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_create_record_table_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        create_record_table(&conn, "tag_aa_bb").unwrap();
        create_record_table(&conn, "tag_aa_bb").unwrap();

        assert!(table_names(&conn).contains(&"tag_aa_bb".to_string()));
    }

    #[test]
    fn test_create_environment_table() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        create_environment_table(&conn).unwrap();

        assert!(table_names(&conn).contains(&ENVIRONMENT_TABLE.to_string()));
    }

    #[test]
    fn test_record_table_indexes_created() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        create_record_table(&conn, "tag_aa_bb").unwrap();

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='tag_aa_bb'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(indexes.contains(&"idx_tag_aa_bb_time".to_string()));
        assert!(indexes.contains(&"idx_tag_aa_bb_kind".to_string()));
        assert!(indexes.contains(&"idx_tag_aa_bb_created".to_string()));
    }
}
