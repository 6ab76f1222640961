//! Database schema migrations for pomotick.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// v1: focus session log.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS focus_sessions (
            id                  TEXT PRIMARY KEY,
            started_at          TEXT NOT NULL,
            ended_at            TEXT NOT NULL,
            planned_duration_ms INTEGER NOT NULL CHECK (planned_duration_ms > 0)
        );",
    )?;
    set_schema_version(conn, 1)
}

/// v2: numeric end timestamp for range queries on local-day boundaries.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "ALTER TABLE focus_sessions ADD COLUMN ended_at_ms INTEGER NOT NULL DEFAULT 0;
         UPDATE focus_sessions
            SET ended_at_ms = CAST(ROUND((julianday(ended_at) - 2440587.5) * 86400000) AS INTEGER);
         CREATE INDEX IF NOT EXISTS idx_focus_sessions_ended_at_ms ON focus_sessions(ended_at_ms);",
    )?;
    set_schema_version(conn, 2)
}
