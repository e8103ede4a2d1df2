//! Remote replication: the debounced write queue, the merge engine, and the
//! pull-merge-push orchestration.

mod merge;
mod orchestrator;
mod queue;

pub use merge::{merge_operation_logs, merge_records};
pub use orchestrator::{CollectionCounts, SyncOrchestrator, SyncReport};
pub use queue::{
    DebounceState, Debouncer, FlushReport, SyncIntent, SyncQueue, DEBOUNCE_INTERVAL,
};
