//! Catalog store access.
//!
//! Every request opens its own connection to the catalog database, the same way
//! the rest of the service talks to SQLite. `migrate` creates the tables on
//! startup when they are missing.

use rusqlite::Connection;
use std::path::Path;

const SCHEMA: &str = include_str!("schema.sql");

/// Opens the catalog database with foreign keys enforced.
pub fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
