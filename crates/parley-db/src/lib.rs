//! Database layer for Parley.
//!
//! Provides the SQLite connection pool (via `r2d2`) and the embedded,
//! versioned migrations that create the `conversations` and
//! `uploaded_files` tables. Query helpers live with the code that owns the
//! tables (see `parley-transcripts`).
//!
//! SQLite runs in WAL mode so readers never wait on the single writer; the
//! migrations are compiled into the binary with `include_str!` so the schema
//! always ships with the server that depends on it.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
