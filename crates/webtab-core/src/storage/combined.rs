//! Local-first storage with debounced replication to the remote document

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use super::{keys, GistStore, GistTransport, HttpGistTransport, LocalStore, StorageBackend};
use crate::error::Result;
use crate::models::StorageConfig;
use crate::sync::{FlushReport, SyncIntent, SyncQueue, DEBOUNCE_INTERVAL};

/// Reads and writes the local store; replicates writes to the remote
/// document, when one is configured, through the sync queue.
///
/// A local write completes before any remote work starts, and a remote
/// failure never fails the local operation. Dropping the storage stops the
/// background flusher; call [`CombinedStorage::flush`] first to push
/// pending changes.
pub struct CombinedStorage<T: GistTransport + 'static = HttpGistTransport> {
    shared: Arc<Shared<T>>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

struct Shared<T: GistTransport> {
    local: LocalStore,
    remote: RwLock<Option<Arc<GistStore<T>>>>,
    queue: SyncQueue,
}

impl<T: GistTransport + 'static> CombinedStorage<T> {
    pub fn new(local: LocalStore) -> Self {
        Self::with_debounce(local, DEBOUNCE_INTERVAL)
    }

    pub fn with_debounce(local: LocalStore, quiet_period: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                local,
                remote: RwLock::new(None),
                queue: SyncQueue::with_interval(quiet_period),
            }),
            flusher: Mutex::new(None),
        }
    }

    pub fn local(&self) -> &LocalStore {
        &self.shared.local
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.shared.queue
    }

    /// The remote document, when remote sync is enabled
    pub fn remote(&self) -> Option<Arc<GistStore<T>>> {
        self.shared.current_remote()
    }

    pub fn is_remote_enabled(&self) -> bool {
        self.remote().is_some()
    }

    /// Enable (`Some`) or disable (`None`) replication.
    ///
    /// Pending intents stay queued and go to whichever remote is current
    /// when the timer fires.
    pub fn set_remote(&self, remote: Option<GistStore<T>>) {
        let mut current = self
            .shared
            .remote
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = remote.map(Arc::new);
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.shared.local.get(key).await
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.shared.local.set(key, &value).await?;
        if self.should_replicate(key) {
            self.shared.queue.enqueue(SyncIntent::set(key, value));
            self.ensure_flusher();
        }
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.shared.local.remove(key).await?;
        if self.should_replicate(key) {
            self.shared.queue.enqueue(SyncIntent::remove(key));
            self.ensure_flusher();
        }
        Ok(())
    }

    /// Clear the local store, discard pending intents, then clear the remote
    /// document immediately.
    pub async fn clear(&self) -> Result<()> {
        self.shared.local.clear().await?;
        self.shared.queue.discard();
        if let Some(remote) = self.remote() {
            remote.clear_files().await;
        }
        Ok(())
    }

    /// Push every pending intent now. No-op while remote sync is disabled.
    pub async fn flush(&self) -> FlushReport {
        match self.remote() {
            Some(remote) => self.shared.flush_to(&remote).await,
            None => {
                if !self.shared.queue.is_empty() {
                    tracing::debug!(
                        "Remote sync disabled; keeping {} queued change(s)",
                        self.shared.queue.len()
                    );
                }
                FlushReport::default()
            }
        }
    }

    fn should_replicate(&self, key: &str) -> bool {
        !keys::is_local_only(key) && self.is_remote_enabled()
    }

    fn ensure_flusher(&self) {
        let mut flusher = self.flusher.lock().unwrap_or_else(PoisonError::into_inner);
        if flusher.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime; queued changes are pushed on the next manual sync");
            return;
        };
        let shared = Arc::clone(&self.shared);
        *flusher = Some(runtime.spawn(async move { shared.run_flusher().await }));
    }
}

impl<T: GistTransport + 'static> Drop for CombinedStorage<T> {
    fn drop(&mut self) {
        let flusher = self.flusher.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = flusher.take() {
            handle.abort();
        }
    }
}

impl<T: GistTransport + 'static> Shared<T> {
    fn current_remote(&self) -> Option<Arc<GistStore<T>>> {
        self.remote
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn run_flusher(&self) {
        loop {
            self.queue.wait_until_due().await;
            match self.current_remote() {
                Some(remote) => {
                    self.flush_to(&remote).await;
                }
                None => tracing::debug!(
                    "Remote sync disabled; keeping {} queued change(s)",
                    self.queue.len()
                ),
            }
        }
    }

    async fn flush_to(&self, remote: &GistStore<T>) -> FlushReport {
        let report = self.queue.flush(remote).await;
        if report.applied > 0 {
            self.remember_document_id(remote).await;
        }
        report
    }

    /// Persist a newly created document id so later runs reuse it
    async fn remember_document_id(&self, remote: &GistStore<T>) {
        let Some(document_id) = remote.document_id() else {
            return;
        };

        let stored = match self.local.get(keys::STORAGE_CONFIG).await {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!("Could not read storage config: {}", error);
                return;
            }
        };
        let Some(mut config) =
            stored.and_then(|value| serde_json::from_value::<StorageConfig>(value).ok())
        else {
            return;
        };
        if !config.enable_github || config.gist_id.as_deref() == Some(document_id.as_str()) {
            return;
        }

        config.gist_id = Some(document_id);
        let result = match serde_json::to_value(&config) {
            Ok(value) => self.local.set(keys::STORAGE_CONFIG, &value).await,
            Err(error) => Err(error.into()),
        };
        if let Err(error) = result {
            tracing::warn!("Could not save gist id to storage config: {}", error);
        }
    }
}

impl<T: GistTransport + 'static> StorageBackend for CombinedStorage<T> {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Self::get(self, key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        Self::set(self, key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        Self::remove(self, key).await
    }

    async fn clear(&self) -> Result<()> {
        Self::clear(self).await
    }
}
