//! Pull the remote document, merge it into local state, and write back

use serde::Serialize;

use super::merge::{merge_operation_logs, merge_records, merge_undecoded};
use crate::error::{Error, Result};
use crate::models::{OperationLogEntry, ShortcutEntry, StoredCollection, Todo};
use crate::storage::{keys, read_file, CombinedStorage, GistTransport};

/// Record counts of one collection during a sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionCounts {
    pub local: usize,
    pub remote: usize,
    pub merged: usize,
}

impl CollectionCounts {
    const fn new(local: usize, remote: usize, merged: usize) -> Self {
        Self {
            local,
            remote,
            merged,
        }
    }
}

/// Outcome of a pull
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub shortcuts: CollectionCounts,
    pub todos: CollectionCounts,
    pub operation_logs: CollectionCounts,
}

/// Runs a full pull-merge-push cycle over the synced collections
pub struct SyncOrchestrator<'a, T: GistTransport + 'static> {
    storage: &'a CombinedStorage<T>,
}

impl<'a, T: GistTransport + 'static> SyncOrchestrator<'a, T> {
    pub const fn new(storage: &'a CombinedStorage<T>) -> Self {
        Self { storage }
    }

    /// Merge the remote collections into local state.
    ///
    /// Merged collections are written back through the combined storage, so
    /// they are queued for the remote like any other write. An unreadable
    /// remote document merges as empty collections.
    pub async fn sync_from_remote(&self, now: i64) -> Result<SyncReport> {
        let remote = self.storage.remote().ok_or_else(|| {
            Error::Configuration("GitHub sync is not enabled or has no token".to_string())
        })?;

        tracing::info!("Pulling collections from gist");
        let document = match remote.fetch_document().await {
            Ok(document) => document,
            Err(error) => {
                tracing::warn!("Failed to fetch gist, merging against empty remote: {}", error);
                None
            }
        };
        let remote_file = |key: &str| document.as_ref().and_then(|doc| read_file(doc, key));

        let remote_shortcuts: StoredCollection<ShortcutEntry> =
            StoredCollection::decode(remote_file(keys::SHORTCUTS), "remote shortcuts");
        let remote_todos: StoredCollection<Todo> =
            StoredCollection::decode(remote_file(keys::TODOS), "remote todos");
        let remote_logs: StoredCollection<OperationLogEntry> =
            StoredCollection::decode(remote_file(keys::OPERATION_LOGS), "remote operation logs");

        let local_shortcuts: StoredCollection<ShortcutEntry> =
            StoredCollection::decode(self.storage.get(keys::SHORTCUTS).await?, "shortcuts");
        let local_todos: StoredCollection<Todo> =
            StoredCollection::decode(self.storage.get(keys::TODOS).await?, "todos");
        let local_logs: StoredCollection<OperationLogEntry> = StoredCollection::decode(
            self.storage.get(keys::OPERATION_LOGS).await?,
            "operation logs",
        );

        let counts = |local: usize, remote: usize| CollectionCounts::new(local, remote, 0);
        let mut report = SyncReport {
            shortcuts: counts(local_shortcuts.records.len(), remote_shortcuts.records.len()),
            todos: counts(local_todos.records.len(), remote_todos.records.len()),
            operation_logs: counts(local_logs.records.len(), remote_logs.records.len()),
        };

        let shortcuts = StoredCollection {
            records: merge_records(local_shortcuts.records, remote_shortcuts.records, now),
            undecoded: merge_undecoded(local_shortcuts.undecoded, remote_shortcuts.undecoded),
        };
        let todos = StoredCollection {
            records: merge_records(local_todos.records, remote_todos.records, now),
            undecoded: merge_undecoded(local_todos.undecoded, remote_todos.undecoded),
        };
        let logs = StoredCollection {
            records: merge_operation_logs(local_logs.records, remote_logs.records),
            undecoded: merge_undecoded(local_logs.undecoded, remote_logs.undecoded),
        };
        report.shortcuts.merged = shortcuts.records.len();
        report.todos.merged = todos.records.len();
        report.operation_logs.merged = logs.records.len();

        self.storage
            .set(keys::SHORTCUTS, shortcuts.to_value()?)
            .await?;
        self.storage.set(keys::TODOS, todos.to_value()?).await?;
        self.storage
            .set(keys::OPERATION_LOGS, logs.to_value()?)
            .await?;

        tracing::info!(
            "Merged {} shortcut(s), {} to-do(s), {} log entries",
            report.shortcuts.merged,
            report.todos.merged,
            report.operation_logs.merged
        );
        Ok(report)
    }
}
