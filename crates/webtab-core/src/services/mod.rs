//! Application services built on the storage and sync layers.

mod operation_log;
mod storage;

pub use operation_log::{new_entry_id, IpLookup, OperationLogger, IP_LOOKUP_URL};
pub use storage::{DebugSnapshot, StorageCoordinator};
