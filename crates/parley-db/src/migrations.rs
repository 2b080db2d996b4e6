//! Embedded SQL migrations.
//!
//! Each migration is applied once, inside its own transaction, and recorded
//! in `_parley_migrations`. Already-recorded migrations are skipped, so
//! running the migrator on every startup is safe.

use rusqlite::Connection;
use std::collections::HashSet;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// Ordered schema history. Append only.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_conversations",
        sql: include_str!("migrations/001_conversations.sql"),
    },
    Migration {
        name: "002_uploaded_files",
        sql: include_str!("migrations/002_uploaded_files.sql"),
    },
];

/// Errors that can occur while migrating the schema.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A statement within a migration (or its bookkeeping) failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },

    /// The tracking table could not be read.
    #[error("failed to read applied migrations: {0}")]
    StateQuery(rusqlite::Error),
}

/// Applies every pending migration and returns how many were applied.
///
/// # Errors
///
/// Returns `MigrationError` if a migration fails; the failing migration is
/// rolled back and later ones are not attempted.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply(conn, MIGRATIONS)
}

fn apply(conn: &Connection, migrations: &[Migration]) -> Result<usize, MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _parley_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|source| MigrationError::ExecutionFailed {
        name: "_parley_migrations".to_string(),
        source,
    })?;

    let applied_names = applied(conn).map_err(MigrationError::StateQuery)?;

    let mut count = 0;
    for migration in migrations {
        if applied_names.contains(migration.name) {
            tracing::debug!(migration = migration.name, "migration already applied");
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");
        apply_one(conn, migration).map_err(|source| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source,
        })?;
        count += 1;
    }

    Ok(count)
}

fn applied(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM _parley_migrations")?;
    let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
    names.collect()
}

fn apply_one(conn: &Connection, migration: &Migration) -> rusqlite::Result<()> {
    // Dropping the transaction without commit rolls back partial schema changes.
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO _parley_migrations (name) VALUES (?1)",
        [migration.name],
    )?;
    tx.commit()
}
