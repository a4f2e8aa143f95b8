//! Database connection management

use rusqlite::{Connection, Transaction};
use std::path::Path;
use thiserror::Error;

use super::migrations;

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Invalid stored value: {0}")]
    Value(String),
}

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path)?;

        // Enable foreign keys
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // WAL lets the daemon and the CLI share the file
        conn.pragma_update(None, "journal_mode", "WAL")?;
        // NORMAL synchronous is safe with WAL and faster than FULL
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // 10MB page cache; the version list is one large JSON value
        conn.pragma_update(None, "cache_size", "-10000")?;
        // Store temp tables in memory
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        // Wait for the other process instead of failing with SQLITE_BUSY
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        // Run migrations
        migrations::run_migrations(&conn)?;
        tracing::debug!(path = %path.display(), "database opened");

        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing)
    ///
    /// # Errors
    /// Returns an error if the database cannot be created
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the connection
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Start a transaction; dropped without commit it rolls back
    ///
    /// # Errors
    /// Returns an error if the transaction cannot be started
    pub fn transaction(&mut self) -> Result<Transaction<'_>, DatabaseError> {
        Ok(self.conn.transaction()?)
    }
}
