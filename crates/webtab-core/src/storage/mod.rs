//! Storage backends: the local store, the remote gist document, and the
//! combined local-first view over both.

mod combined;
mod gist;
mod local;

pub use combined::CombinedStorage;
pub use gist::{
    read_file, GistDocument, GistFile, GistPatch, GistStore, GistTransport, HttpGistTransport,
    NewGist, DEFAULT_GIST_API_URL, DOCUMENT_DESCRIPTION, LEGACY_FILE_KEY, PLACEHOLDER_FILE_KEY,
};
pub use local::LocalStore;

use serde_json::Value;

use crate::error::Result;

/// Reserved keys with a fixed meaning
pub mod keys {
    /// Remote sync settings; never pushed to the remote document
    pub const STORAGE_CONFIG: &str = "storage_config";
    pub const SHORTCUTS: &str = "shortcuts";
    pub const TODOS: &str = "todos";
    pub const OPERATION_LOGS: &str = "operation_logs";
    pub const BACKGROUND_SETTINGS: &str = "background_settings";
    pub const SEARCH_ENGINE: &str = "search_engine";

    /// Keys whose writes stay on this device
    pub fn is_local_only(key: &str) -> bool {
        key == STORAGE_CONFIG
    }
}

/// Key/value operations shared by every storage backend (async)
///
/// Values are arbitrary JSON documents.
#[allow(async_fn_in_trait)]
pub trait StorageBackend {
    /// Read the value stored under `key`; `None` when absent
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Delete `key`
    async fn remove(&self, key: &str) -> Result<()>;

    /// Delete every key
    async fn clear(&self) -> Result<()>;
}
