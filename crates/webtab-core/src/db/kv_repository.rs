//! Key/value repository implementation

use crate::error::{Error, Result};
use libsql::Connection;
use serde_json::Value;
use std::collections::BTreeMap;

/// Trait for JSON key/value storage operations (async)
#[allow(async_fn_in_trait)]
pub trait KeyValueRepository {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Insert or replace the value stored under `key`
    async fn set(&self, key: &str, value: &Value) -> Result<()>;

    /// Delete `key`; missing keys are not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// Delete every key
    async fn clear(&self) -> Result<()>;

    /// Every key with its value, ordered by key
    async fn get_all(&self) -> Result<BTreeMap<String, Value>>;
}

/// libSQL implementation of `KeyValueRepository`
pub struct LibSqlKeyValueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlKeyValueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl KeyValueRepository for LibSqlKeyValueRepository<'_> {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv WHERE key = ?", [key])
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let raw: String = row.get(0)?;
        let value = serde_json::from_str(&raw).map_err(|error| {
            Error::Database(format!("Stored value for '{key}' is not valid JSON: {error}"))
        })?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
                [key, raw.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?", [key])
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM kv", ()).await?;
        Ok(())
    }

    async fn get_all(&self) -> Result<BTreeMap<String, Value>> {
        let mut rows = self
            .conn
            .query("SELECT key, value FROM kv ORDER BY key", ())
            .await?;

        let mut entries = BTreeMap::new();
        while let Some(row) = rows.next().await? {
            let key: String = row.get(0)?;
            let raw: String = row.get(1)?;
            // Undecodable values are surfaced as raw strings
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            entries.insert(key, value);
        }
        Ok(entries)
    }
}
