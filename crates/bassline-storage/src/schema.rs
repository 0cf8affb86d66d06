//! Table layout of a network database.
//!
//! Each network keeps three layers: its last snapshot (`networks`), group
//! states written after it (`group_states`), and content overlays written
//! after those (`contact_contents`). `seq` orders writes across layers.
//! The layout is versioned through SQLite's `user_version`.

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;

/// Layout version a freshly opened database ends at.
pub const LAYOUT_VERSION: usize = 1;

fn layout_steps() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_initial_schema.sql"))])
}

/// A network database at `path`, created when missing and upgraded to
/// [`LAYOUT_VERSION`].
pub fn connect(path: &str) -> Result<Connection, StorageError> {
    let mut conn = Connection::open(path)?;
    prepare(&mut conn)?;
    Ok(conn)
}

/// A throwaway network database that lives as long as the connection.
pub fn connect_in_memory() -> Result<Connection, StorageError> {
    let mut conn = Connection::open_in_memory()?;
    prepare(&mut conn)?;
    Ok(conn)
}

/// The layout version recorded in `conn`; 0 for an empty file.
pub fn layout_version(conn: &Connection) -> Result<usize, StorageError> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(usize::try_from(version).unwrap_or(0))
}

fn prepare(conn: &mut Connection) -> Result<(), StorageError> {
    let found = layout_version(conn)?;
    if found > LAYOUT_VERSION {
        return Err(StorageError::Migration(format!(
            "database layout {found} is newer than supported layout {LAYOUT_VERSION}"
        )));
    }

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    // Deleting a network row removes its group states and overlays.
    conn.pragma_update(None, "foreign_keys", "ON")?;

    layout_steps()
        .to_latest(conn)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    if found < LAYOUT_VERSION {
        tracing::debug!(from = found, to = LAYOUT_VERSION, "upgraded network database layout");
    }
    Ok(())
}
