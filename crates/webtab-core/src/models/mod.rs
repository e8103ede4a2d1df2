//! Data models for WebTab

mod operation_log;
mod record;
mod shortcut;
mod storage_config;
mod todo;

pub use operation_log::{ClientInfo, OperationKind, OperationLogEntry, MAX_LOG_ENTRIES, UNKNOWN};
pub use record::{encode_collection, RecordId, StoredCollection, SyncMeta, SyncRecord};
pub use shortcut::{GroupFlag, Shortcut, ShortcutEntry, ShortcutGroup, ShortcutList, ShortcutPatch};
pub use storage_config::StorageConfig;
pub use todo::{Todo, TodoList};
