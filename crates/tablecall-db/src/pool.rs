//! SQLite connection pooling for call turns.
//!
//! Each call turn checks out one connection for a few short statements, so
//! the pool is small and a checkout that cannot be served quickly fails
//! instead of queueing behind a stuck writer.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    pub pool_max_size: u32,
    /// How long a checkout waits for a free connection, in milliseconds.
    pub checkout_timeout_ms: u64,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
            checkout_timeout_ms: 2_000,
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to open restaurant store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: r2d2::Error,
    },
}

/// Per-connection setup: WAL journaling, relaxed fsync, enforced foreign
/// keys (menu items and orders reference restaurants) and the busy timeout.
fn init_connection(conn: &mut Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    // In-memory databases report "memory".
    if journal_mode != "wal" && journal_mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal mode stuck at {}", journal_mode)),
        ));
    }
    conn.execute_batch(&format!(
        "PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {};",
        busy_timeout_ms
    ))
}

/// Opens the pool over the database file at `db_path`.
///
/// `:memory:` works, but every pooled connection then sees its own private
/// database; anything sharing state across connections needs a file.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let busy_timeout_ms = settings.busy_timeout_ms;

    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(flags)
        .with_init(move |conn| init_connection(conn, busy_timeout_ms));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .connection_timeout(Duration::from_millis(settings.checkout_timeout_ms))
        .build(manager)
        .map_err(|source| PoolError::Open {
            path: db_path.to_string(),
            source,
        })?;

    tracing::debug!(
        path = db_path,
        max_size = settings.pool_max_size,
        "restaurant store pool ready"
    );
    Ok(pool)
}
