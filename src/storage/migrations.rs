/// Database migration management
///
/// This module creates and updates the SQLite schema backing the
/// wide-column tables. Every logical table shares the one `items` table,
/// told apart by its `table_name` column.

use rusqlite::Connection;

use crate::storage::TableError;

/// Current database schema version
///
/// Increment this when you add new migrations
const CURRENT_VERSION: i32 = 1;

/// Initialize the database schema
///
/// This creates all required tables and indexes if they don't exist.
/// It also sets up the version tracking for future migrations.
pub fn initialize_database(conn: &Connection) -> Result<(), TableError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let current_version = get_current_version(conn)?;

    if current_version < CURRENT_VERSION {
        run_migrations(conn, current_version)?;
        set_version(conn, CURRENT_VERSION)?;
    }

    Ok(())
}

/// Get the current database schema version
fn get_current_version(conn: &Connection) -> Result<i32, TableError> {
    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get::<_, i32>(0)
        })
        .unwrap_or(0); // Default to version 0 if no version record exists

    Ok(version)
}

/// Set the database schema version
fn set_version(conn: &Connection, version: i32) -> Result<(), TableError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Run database migrations from the current version to the latest
fn run_migrations(conn: &Connection, from_version: i32) -> Result<(), TableError> {
    if from_version < 1 {
        migration_v1(conn)?;
    }

    Ok(())
}

/// Migration to version 1: the items table and its index
///
/// `lsi_sk` holds the sort key of the table's local secondary index and is
/// NULL for items that are not part of the index.
fn migration_v1(conn: &Connection) -> Result<(), TableError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS items (
            table_name TEXT NOT NULL,
            pk TEXT NOT NULL,
            sk TEXT NOT NULL,
            lsi_sk TEXT,
            attributes TEXT NOT NULL,
            PRIMARY KEY (table_name, pk, sk)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_items_local_index
         ON items (table_name, pk, lsi_sk, sk)",
        [],
    )?;

    tracing::info!("Applied migration v1: created items table");
    Ok(())
}
