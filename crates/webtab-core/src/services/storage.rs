//! Application-facing storage service.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::models::{
    encode_collection, ShortcutEntry, ShortcutList, StorageConfig, StoredCollection, Todo, TodoList,
};
use crate::storage::{
    keys, CombinedStorage, GistStore, GistTransport, HttpGistTransport, LocalStore, StorageBackend,
};
use crate::sync::{FlushReport, SyncOrchestrator, SyncReport};
use crate::util::unix_millis_now;

type Connector<T> = Box<dyn Fn(&str) -> Result<T> + Send + Sync>;

/// Single entry point for reads, writes, remote configuration and sync.
///
/// Owns the combined storage and rebuilds its remote backend whenever the
/// stored [`StorageConfig`] changes.
pub struct StorageCoordinator<T: GistTransport + 'static = HttpGistTransport> {
    storage: CombinedStorage<T>,
    connect: Connector<T>,
}

/// Diagnostic view of the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSnapshot {
    pub durable: bool,
    pub all_data: BTreeMap<String, Value>,
    pub config: StorageConfig,
    pub remote_enabled: bool,
    pub document_id: Option<String>,
    pub pending_changes: usize,
    pub pending_keys: Vec<String>,
    pub shortcut_count: usize,
    pub todo_count: usize,
    pub background_settings: Option<Value>,
}

impl StorageCoordinator<HttpGistTransport> {
    /// Coordinator that talks to the gist API at `api_url`
    pub fn github(local: LocalStore, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        Self::new(local, move |token| {
            HttpGistTransport::new(api_url.clone(), token)
        })
    }
}

impl<T: GistTransport + 'static> StorageCoordinator<T> {
    /// `connect` builds a transport from a token when remote sync is enabled
    pub fn new(
        local: LocalStore,
        connect: impl Fn(&str) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self::with_storage(CombinedStorage::new(local), connect)
    }

    pub fn with_storage(
        storage: CombinedStorage<T>,
        connect: impl Fn(&str) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            storage,
            connect: Box::new(connect),
        }
    }

    pub const fn storage(&self) -> &CombinedStorage<T> {
        &self.storage
    }

    /// Load the stored configuration and enable or disable the remote
    pub async fn init(&self) -> Result<()> {
        let config = self.load_config().await?;
        match config.active_token() {
            Some(token) => {
                let transport = (self.connect)(&token)?;
                self.storage
                    .set_remote(Some(GistStore::new(transport, config.gist_id.clone())));
                tracing::debug!(
                    "GitHub sync enabled{}",
                    config
                        .gist_id
                        .as_deref()
                        .map(|id| format!(" (gist {id})"))
                        .unwrap_or_default()
                );
            }
            None => {
                self.storage.set_remote(None);
                tracing::debug!("GitHub sync disabled");
            }
        }
        Ok(())
    }

    async fn load_config(&self) -> Result<StorageConfig> {
        let Some(value) = self.storage.local().get(keys::STORAGE_CONFIG).await? else {
            return Ok(StorageConfig::default());
        };
        Ok(serde_json::from_value(value).unwrap_or_else(|error| {
            tracing::warn!("Ignoring malformed storage config: {}", error);
            StorageConfig::default()
        }))
    }

    /// Stored configuration, with the document id in use when the remote has
    /// created one since it was saved
    pub async fn storage_config(&self) -> Result<StorageConfig> {
        let mut config = self.load_config().await?;
        if let Some(document_id) = self.storage.remote().and_then(|remote| remote.document_id()) {
            config.gist_id = Some(document_id);
        }
        Ok(config)
    }

    /// Persist the configuration locally and re-initialise the remote
    pub async fn set_storage_config(&self, config: &StorageConfig) -> Result<()> {
        self.storage
            .local()
            .set(keys::STORAGE_CONFIG, &serde_json::to_value(config)?)
            .await?;
        self.init().await
    }

    /// Create an empty private gist with `token` and return its id
    pub async fn create_placeholder_document(&self, token: &str) -> Result<String> {
        let remote = GistStore::new((self.connect)(token)?, None);
        remote.create_placeholder_document(unix_millis_now()).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.storage.get(key).await
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.storage.set(key, value).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.storage.remove(key).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.storage.clear().await
    }

    /// Read a stored array; elements that do not decode are kept aside
    pub async fn get_collection<R: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<StoredCollection<R>> {
        Ok(StoredCollection::decode(self.get(key).await?, key))
    }

    pub async fn set_collection<R: Serialize>(
        &self,
        key: &str,
        collection: &StoredCollection<R>,
    ) -> Result<()> {
        self.set(key, collection.to_value()?).await
    }

    pub async fn shortcuts(&self) -> Result<ShortcutList> {
        let stored: StoredCollection<ShortcutEntry> = self.get_collection(keys::SHORTCUTS).await?;
        Ok(ShortcutList::from_stored(stored))
    }

    pub async fn save_shortcuts(&self, shortcuts: &ShortcutList) -> Result<()> {
        let value = encode_collection(shortcuts.entries(), shortcuts.undecoded())?;
        self.set(keys::SHORTCUTS, value).await
    }

    pub async fn todos(&self) -> Result<TodoList> {
        let stored: StoredCollection<Todo> = self.get_collection(keys::TODOS).await?;
        Ok(TodoList::from_stored(stored))
    }

    pub async fn save_todos(&self, todos: &TodoList) -> Result<()> {
        let value = encode_collection(todos.items(), todos.undecoded())?;
        self.set(keys::TODOS, value).await
    }

    /// Push pending changes now
    pub async fn sync_to_remote(&self) -> FlushReport {
        self.storage.flush().await
    }

    /// Pull, merge and write back every synced collection
    pub async fn sync_from_remote(&self) -> Result<SyncReport> {
        self.sync_from_remote_at(unix_millis_now()).await
    }

    pub async fn sync_from_remote_at(&self, now: i64) -> Result<SyncReport> {
        SyncOrchestrator::new(&self.storage)
            .sync_from_remote(now)
            .await
    }

    pub async fn debug_snapshot(&self) -> Result<DebugSnapshot> {
        let mut all_data = self.storage.local().get_all().await?;
        let config = self.storage_config().await?.redacted();
        if all_data.contains_key(keys::STORAGE_CONFIG) {
            all_data.insert(keys::STORAGE_CONFIG.to_string(), serde_json::to_value(&config)?);
        }

        let shortcut_count = self.shortcuts().await?.visible().len();
        let todo_count = self.todos().await?.visible().len();
        let remote = self.storage.remote();
        let queue = self.storage.queue();

        Ok(DebugSnapshot {
            durable: self.storage.local().is_durable(),
            background_settings: all_data.get(keys::BACKGROUND_SETTINGS).cloned(),
            all_data,
            config,
            remote_enabled: remote.is_some(),
            document_id: remote.and_then(|remote| remote.document_id()),
            pending_changes: queue.len(),
            pending_keys: queue.pending_keys(),
            shortcut_count,
            todo_count,
        })
    }
}

impl<T: GistTransport + 'static> StorageBackend for StorageCoordinator<T> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::RecordId;
    use crate::testing::FakeGist;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn coordinator(fake: &FakeGist) -> StorageCoordinator<FakeGist> {
        let fake = fake.clone();
        StorageCoordinator::new(LocalStore::volatile(), move |_token| Ok(fake.clone()))
    }

    #[tokio::test]
    async fn test_init_without_config_keeps_remote_off() {
        let fake = FakeGist::default();
        let coordinator = coordinator(&fake);
        coordinator.init().await.unwrap();

        assert!(!coordinator.storage().is_remote_enabled());
        assert_eq!(coordinator.storage_config().await.unwrap(), StorageConfig::default());
        assert!(matches!(
            coordinator.sync_from_remote().await,
            Err(Error::Configuration(_))
        ));
        assert!(coordinator.sync_to_remote().await.is_empty());
    }

    #[tokio::test]
    async fn test_set_storage_config_toggles_remote() {
        let fake = FakeGist::default();
        let coordinator = coordinator(&fake);

        coordinator
            .set_storage_config(&StorageConfig::github("ghp_x", Some("gist-9".to_string())))
            .await
            .unwrap();
        assert_eq!(
            coordinator.storage().remote().unwrap().document_id().as_deref(),
            Some("gist-9")
        );

        coordinator
            .set_storage_config(&StorageConfig::disabled())
            .await
            .unwrap();
        assert!(!coordinator.storage().is_remote_enabled());
    }

    #[tokio::test]
    async fn test_connector_errors_surface_from_init() {
        let coordinator: StorageCoordinator<FakeGist> =
            StorageCoordinator::new(LocalStore::volatile(), |_token| {
                Err(Error::Configuration("bad url".to_string()))
            });
        let result = coordinator
            .set_storage_config(&StorageConfig::github("t", None))
            .await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_learned_document_id_is_reported_and_persisted() {
        let fake = FakeGist::default();
        let coordinator = coordinator(&fake);
        coordinator
            .set_storage_config(&StorageConfig::github("t", None))
            .await
            .unwrap();

        coordinator.set("todos", json!([])).await.unwrap();
        let report = coordinator.sync_to_remote().await;
        assert_eq!(report.applied, 1);

        let config = coordinator.storage_config().await.unwrap();
        let gist_id = config.gist_id.clone().unwrap();
        assert_eq!(fake.json(&gist_id, "todos"), Some(json!([])));

        // A fresh init reads the persisted id back
        coordinator.init().await.unwrap();
        assert_eq!(
            coordinator.storage().remote().unwrap().document_id(),
            Some(gist_id)
        );
    }

    #[tokio::test]
    async fn test_collections_round_trip_through_store() {
        let fake = FakeGist::default();
        let coordinator = coordinator(&fake);

        let mut shortcuts = coordinator.shortcuts().await.unwrap();
        shortcuts.add("GitHub", "https://github.com", None, 1);
        coordinator.save_shortcuts(&shortcuts).await.unwrap();

        let mut todos = coordinator.todos().await.unwrap();
        todos.add("write docs", 1).unwrap();
        coordinator.save_todos(&todos).await.unwrap();

        assert_eq!(coordinator.shortcuts().await.unwrap(), shortcuts);
        assert_eq!(coordinator.todos().await.unwrap().visible().len(), 1);
    }

    #[tokio::test]
    async fn test_saving_keeps_unknown_fields_and_undecodable_elements() {
        let fake = FakeGist::default();
        let coordinator = coordinator(&fake);
        coordinator
            .set(
                keys::TODOS,
                json!([
                    {"id": 1, "text": "x", "updatedAt": 10, "priority": "high"},
                    "written by a future client"
                ]),
            )
            .await
            .unwrap();

        let mut todos = coordinator.todos().await.unwrap();
        assert_eq!(todos.items().len(), 1);
        todos.toggle(&RecordId::Number(1), 20).unwrap();
        coordinator.save_todos(&todos).await.unwrap();

        assert_eq!(
            coordinator.get(keys::TODOS).await.unwrap(),
            Some(json!([
                {"id": 1, "text": "x", "completed": true, "updatedAt": 20, "priority": "high"},
                "written by a future client"
            ]))
        );
    }

    #[tokio::test]
    async fn test_debug_snapshot_redacts_token() {
        let fake = FakeGist::default();
        let coordinator = coordinator(&fake);
        coordinator
            .set_storage_config(&StorageConfig::github("ghp_secret", None))
            .await
            .unwrap();
        coordinator
            .set("background_settings", json!({"type": "color", "value": "#000"}))
            .await
            .unwrap();

        let snapshot = coordinator.debug_snapshot().await.unwrap();
        let rendered = serde_json::to_string(&snapshot).unwrap();
        assert!(!rendered.contains("ghp_secret"));
        assert!(snapshot.remote_enabled);
        assert_eq!(snapshot.pending_keys, vec!["set_background_settings"]);
        assert_eq!(
            snapshot.background_settings,
            Some(json!({"type": "color", "value": "#000"}))
        );
        assert!(!snapshot.durable);
    }

    #[tokio::test]
    async fn test_end_to_end_sync_between_two_devices() {
        let fake = FakeGist::default();
        let tmp = tempdir().unwrap();

        let laptop = StorageCoordinator::new(
            LocalStore::open(tmp.path().join("laptop.db")).await.unwrap(),
            {
                let fake = fake.clone();
                move |_token| Ok(fake.clone())
            },
        );
        laptop
            .set_storage_config(&StorageConfig::github("t", None))
            .await
            .unwrap();
        let mut todos = laptop.todos().await.unwrap();
        todos.add("from laptop", 100).unwrap();
        laptop.save_todos(&todos).await.unwrap();
        laptop.sync_to_remote().await;
        let gist_id = laptop.storage_config().await.unwrap().gist_id.unwrap();

        let desktop = coordinator(&fake);
        desktop
            .set_storage_config(&StorageConfig::github("t", Some(gist_id)))
            .await
            .unwrap();
        let mut local = desktop.todos().await.unwrap();
        local.add("from desktop", 200).unwrap();
        desktop.save_todos(&local).await.unwrap();

        let report = desktop.sync_from_remote_at(300).await.unwrap();
        assert_eq!(report.todos.local, 1);
        assert_eq!(report.todos.remote, 1);
        assert_eq!(report.todos.merged, 2);

        let texts: Vec<String> = desktop
            .todos()
            .await
            .unwrap()
            .visible()
            .into_iter()
            .map(|todo| todo.text)
            .collect();
        assert_eq!(texts, vec!["from desktop", "from laptop"]);
    }
}
