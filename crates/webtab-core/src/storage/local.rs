//! Device-local key/value store

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use super::StorageBackend;
use crate::db::{Database, KeyValueRepository, LibSqlKeyValueRepository};
use crate::error::Result;

/// The authoritative local store.
///
/// Backed by a libSQL file when one can be opened, otherwise by a volatile
/// in-process map. Cloning shares the same underlying store.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Backing>,
}

enum Backing {
    Durable(Mutex<Database>),
    Volatile(Mutex<BTreeMap<String, Value>>),
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LocalStore")
            .field("durable", &self.is_durable())
            .finish()
    }
}

impl LocalStore {
    /// Open the durable store at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(path).await?;
        Ok(Self::from_database(db))
    }

    /// Open the durable store at `path`, falling back to a volatile store
    /// when the file cannot be opened
    pub async fn open_or_volatile(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Database::open(path).await {
            Ok(db) => Self::from_database(db),
            Err(error) => {
                tracing::warn!(
                    "Could not open local store at {}: {}. Changes will not survive a restart.",
                    path.display(),
                    error
                );
                Self::volatile()
            }
        }
    }

    /// Durable store over an in-memory libSQL database
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::from_database(db))
    }

    /// Store kept only in process memory
    pub fn volatile() -> Self {
        Self {
            inner: Arc::new(Backing::Volatile(Mutex::new(BTreeMap::new()))),
        }
    }

    fn from_database(db: Database) -> Self {
        Self {
            inner: Arc::new(Backing::Durable(Mutex::new(db))),
        }
    }

    pub fn is_durable(&self) -> bool {
        matches!(*self.inner, Backing::Durable(_))
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        match &*self.inner {
            Backing::Durable(db) => {
                let db = db.lock().await;
                LibSqlKeyValueRepository::new(db.connection()).get(key).await
            }
            Backing::Volatile(map) => Ok(map.lock().await.get(key).cloned()),
        }
    }

    pub async fn set(&self, key: &str, value: &Value) -> Result<()> {
        match &*self.inner {
            Backing::Durable(db) => {
                let db = db.lock().await;
                LibSqlKeyValueRepository::new(db.connection())
                    .set(key, value)
                    .await
            }
            Backing::Volatile(map) => {
                map.lock().await.insert(key.to_string(), value.clone());
                Ok(())
            }
        }
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        match &*self.inner {
            Backing::Durable(db) => {
                let db = db.lock().await;
                LibSqlKeyValueRepository::new(db.connection())
                    .remove(key)
                    .await
            }
            Backing::Volatile(map) => {
                map.lock().await.remove(key);
                Ok(())
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        match &*self.inner {
            Backing::Durable(db) => {
                let db = db.lock().await;
                LibSqlKeyValueRepository::new(db.connection()).clear().await
            }
            Backing::Volatile(map) => {
                map.lock().await.clear();
                Ok(())
            }
        }
    }

    /// Snapshot of every stored key, ordered by key
    pub async fn get_all(&self) -> Result<BTreeMap<String, Value>> {
        match &*self.inner {
            Backing::Durable(db) => {
                let db = db.lock().await;
                LibSqlKeyValueRepository::new(db.connection())
                    .get_all()
                    .await
            }
            Backing::Volatile(map) => Ok(map.lock().await.clone()),
        }
    }
}

impl StorageBackend for LocalStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Self::get(self, key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        Self::set(self, key, &value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        Self::remove(self, key).await
    }

    async fn clear(&self) -> Result<()> {
        Self::clear(self).await
    }
}
