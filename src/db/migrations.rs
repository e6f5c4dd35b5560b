//! Database migrations
//!
//! Versioned schema migrations tracked in the `schema_migrations` table.

use crate::core::error::{Result, WardenError};
use rusqlite::Connection;
use tracing::{info, warn};

/// Migration version tracking table
const MIGRATION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
"#;

/// Initial schema migration (version 1)
///
/// The UNIQUE constraint on `email` is the authority for duplicate signups.
const MIGRATION_V1: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Second schema migration (version 2)
const MIGRATION_V2: &str = r#"
CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at);
"#;

const MIGRATIONS: &[(i64, &str, &str)] = &[
    (1, "Users table", MIGRATION_V1),
    (2, "Users listing index", MIGRATION_V2),
];

/// Run all pending database migrations
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    info!("Running database migrations");

    conn.execute_batch(MIGRATION_TABLE)?;

    let current_version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    info!("Current database schema version: {}", current_version);

    for &(version, name, sql) in MIGRATIONS {
        if current_version < version {
            info!("Applying migration v{}: {}", version, name);
            apply_migration(conn, version, sql)?;
        }
    }

    Ok(())
}

/// Latest schema version known to this build
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|(version, _, _)| *version).unwrap_or(0)
}

/// Apply a single migration
fn apply_migration(conn: &mut Connection, version: i64, sql: &str) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(sql).map_err(|e| {
        warn!("Migration v{} failed: {}", version, e);
        WardenError::DatabaseError(e)
    })?;

    tx.execute("INSERT INTO schema_migrations (version) VALUES (?)", [version])?;

    tx.commit()?;

    info!("Migration v{} applied successfully", version);
    Ok(())
}
