//! webtab-core - Core library for WebTab
//!
//! Offline-first storage for the new-tab page: a durable local key/value
//! store that is always authoritative, optional replication of every write
//! to a private GitHub gist through a debounced queue, and a last-write-wins
//! merge (with tombstones) for pulling changes made on other devices.

pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod sync;
pub mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use services::{DebugSnapshot, OperationLogger, StorageCoordinator};
pub use storage::{CombinedStorage, GistStore, HttpGistTransport, LocalStore, StorageBackend};
