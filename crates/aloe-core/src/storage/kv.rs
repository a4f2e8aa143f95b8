//! Prefixed key-value storage operations
//!
//! Values are stored as JSON text. `get`/`set` never fail: they log and
//! return `None`/`false`. The `try_*` variants propagate errors so a caller
//! running inside a transaction can abort it.

use crate::storage::db::DatabaseError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Key-value storage operations
pub struct SnapshotStore<'a> {
    conn: &'a Connection,
    prefix: &'a str,
}

impl<'a> SnapshotStore<'a> {
    /// Create a new store over a connection (or an open transaction)
    pub fn new(conn: &'a Connection, prefix: &'a str) -> Self {
        Self { conn, prefix }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Read the raw JSON text stored under a key
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let value = self
            .conn
            .query_row(
                r"
                SELECT value FROM kv_entries WHERE key = ?1
                ",
                params![self.full_key(key)],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Read and deserialize a value
    ///
    /// # Errors
    /// Returns an error if the query fails or the stored JSON does not match `T`
    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DatabaseError> {
        match self.get_raw(key)? {
            Some(json) => {
                let value = serde_json::from_str(&json).map_err(|e| {
                    DatabaseError::Value(format!("Failed to parse value for '{key}': {e}"))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Read a value, returning `None` when missing or unreadable
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read storage key");
                None
            }
        }
    }

    /// Serialize and write a value
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails
    pub fn try_set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(value).map_err(|e| {
            DatabaseError::Value(format!("Failed to serialize value for '{key}': {e}"))
        })?;
        self.set_raw(key, &json)
    }

    /// Write raw JSON text under a key
    ///
    /// # Errors
    /// Returns an error if the write fails
    pub fn set_raw(&self, key: &str, json: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            r"
            INSERT INTO kv_entries (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![self.full_key(key), json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Write a value, returning `false` on any failure
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to write storage key");
                false
            }
        }
    }

    /// Delete a key
    ///
    /// # Errors
    /// Returns an error if the delete fails
    pub fn remove(&self, key: &str) -> Result<bool, DatabaseError> {
        let deleted = self.conn.execute(
            r"
            DELETE FROM kv_entries WHERE key = ?1
            ",
            params![self.full_key(key)],
        )?;
        Ok(deleted > 0)
    }

    /// List keys under this store's prefix (without the prefix)
    ///
    /// # Errors
    /// Returns an error if the query fails
    pub fn keys(&self) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT key FROM kv_entries WHERE instr(key, ?1) = 1 ORDER BY key
            ",
        )?;

        let rows = stmt.query_map(params![self.prefix], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for row in rows {
            let key = row?;
            if let Some(name) = key.strip_prefix(self.prefix) {
                keys.push(name.to_string());
            }
        }
        Ok(keys)
    }
}
