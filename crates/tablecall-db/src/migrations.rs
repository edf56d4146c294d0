//! Schema migrations compiled into the binary.
//!
//! Applied names are recorded in `_tablecall_migrations`; startup applies
//! whatever is missing, in list order.

use rusqlite::Connection;
use std::collections::HashSet;
use thiserror::Error;

/// `(name, sql)` pairs in apply order. Append only.
const MIGRATIONS: &[(&str, &str)] = &[
    ("000_init", include_str!("migrations/000_init.sql")),
    ("001_restaurants", include_str!("migrations/001_restaurants.sql")),
    ("002_orders", include_str!("migrations/002_orders.sql")),
    ("003_transcripts", include_str!("migrations/003_transcripts.sql")),
    ("004_bookings", include_str!("migrations/004_bookings.sql")),
];

const BOOTSTRAP_SQL: &str = "CREATE TABLE IF NOT EXISTS _tablecall_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to read applied migrations: {0}")]
    StateQuery(#[source] rusqlite::Error),
}

/// Applies every pending migration and returns how many ran.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply_pending(conn, MIGRATIONS)
}

fn apply_pending(conn: &Connection, migrations: &[(&str, &str)]) -> Result<usize, MigrationError> {
    conn.execute_batch(BOOTSTRAP_SQL)
        .map_err(|source| MigrationError::ExecutionFailed {
            name: "bootstrap".to_string(),
            source,
        })?;

    let done = applied_names(conn).map_err(MigrationError::StateQuery)?;
    let pending: Vec<_> = migrations
        .iter()
        .filter(|(name, _)| !done.contains(*name))
        .collect();

    for (name, sql) in &pending {
        tracing::info!(migration = *name, "applying migration");
        apply_one(conn, name, sql).map_err(|source| MigrationError::ExecutionFailed {
            name: name.to_string(),
            source,
        })?;
    }
    Ok(pending.len())
}

fn applied_names(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM _tablecall_migrations")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<HashSet<String>>>()?;
    Ok(names)
}

/// Schema change and its tracking row commit together or not at all.
fn apply_one(conn: &Connection, name: &str, sql: &str) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(sql)?;
    tx.execute("INSERT INTO _tablecall_migrations (name) VALUES (?1)", [name])?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_table(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn fresh_database_gets_every_table_once() {
        let conn = Connection::open_in_memory().unwrap();

        assert_eq!(run_migrations(&conn).unwrap(), MIGRATIONS.len());
        assert_eq!(run_migrations(&conn).unwrap(), 0);

        for table in ["restaurants", "menu_items", "orders", "transcripts", "bookings"] {
            assert!(has_table(&conn, table), "{table} missing");
        }
    }

    #[test]
    fn only_missing_migrations_run() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pending(&conn, &MIGRATIONS[..2]).unwrap();
        assert!(has_table(&conn, "restaurants"));
        assert!(!has_table(&conn, "orders"));

        assert_eq!(run_migrations(&conn).unwrap(), MIGRATIONS.len() - 2);
        assert!(has_table(&conn, "bookings"));
    }

    #[test]
    fn failed_tracking_insert_rolls_back_schema() {
        let conn = Connection::open_in_memory().unwrap();
        let clash = [(
            "900_clash",
            "CREATE TABLE probe (id INTEGER PRIMARY KEY);
             INSERT INTO _tablecall_migrations (name) VALUES ('900_clash');",
        )];

        match apply_pending(&conn, &clash).unwrap_err() {
            MigrationError::ExecutionFailed { name, .. } => assert_eq!(name, "900_clash"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!has_table(&conn, "probe"));
    }
}
