//! Append-only log of user actions, stored under `operation_logs`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::StorageCoordinator;
use crate::error::Result;
use crate::models::{
    ClientInfo, OperationKind, OperationLogEntry, StoredCollection, MAX_LOG_ENTRIES, UNKNOWN,
};
use crate::storage::{keys, GistTransport};
use crate::util::unix_millis_now;

/// Public IP echo service
pub const IP_LOOKUP_URL: &str = "https://api.ipify.org?format=json";

const IP_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// How the client's public IP is determined for new entries
#[derive(Debug, Clone, Default)]
pub enum IpLookup {
    /// Always record `"unknown"`
    #[default]
    Disabled,
    /// Ask an echo service returning `{"ip": "..."}`
    Http { client: reqwest::Client, url: String },
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

impl IpLookup {
    /// Lookup against [`IP_LOOKUP_URL`]
    pub fn public() -> Self {
        match reqwest::Client::builder().timeout(IP_LOOKUP_TIMEOUT).build() {
            Ok(client) => Self::Http {
                client,
                url: IP_LOOKUP_URL.to_string(),
            },
            Err(error) => {
                tracing::warn!("IP lookup unavailable: {}", error);
                Self::Disabled
            }
        }
    }

    /// The public IP, or `"unknown"` on any failure or after 3 s
    pub async fn resolve(&self) -> String {
        let Self::Http { client, url } = self else {
            return UNKNOWN.to_string();
        };

        let request = async {
            client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .json::<IpResponse>()
                .await
        };

        match tokio::time::timeout(IP_LOOKUP_TIMEOUT, request).await {
            Ok(Ok(response)) if !response.ip.trim().is_empty() => response.ip.trim().to_string(),
            Ok(Ok(_)) => UNKNOWN.to_string(),
            Ok(Err(error)) => {
                tracing::debug!("IP lookup failed: {}", error);
                UNKNOWN.to_string()
            }
            Err(_) => {
                tracing::debug!("IP lookup timed out");
                UNKNOWN.to_string()
            }
        }
    }
}

/// `<millis>-<9 random characters>`
pub fn new_entry_id(now: i64) -> String {
    let random = Uuid::now_v7().simple().to_string();
    format!("{now}-{}", &random[random.len() - 9..])
}

/// Records user actions through the storage coordinator
pub struct OperationLogger<'a, T: GistTransport + 'static> {
    storage: &'a StorageCoordinator<T>,
    client: ClientInfo,
    ip_lookup: IpLookup,
}

impl<'a, T: GistTransport + 'static> OperationLogger<'a, T> {
    pub fn new(storage: &'a StorageCoordinator<T>, client: ClientInfo) -> Self {
        Self {
            storage,
            client,
            ip_lookup: IpLookup::Disabled,
        }
    }

    #[must_use]
    pub fn with_ip_lookup(mut self, ip_lookup: IpLookup) -> Self {
        self.ip_lookup = ip_lookup;
        self
    }

    /// Prepend an entry to the log.
    ///
    /// Never fails: problems are logged and `None` is returned.
    pub async fn record(
        &self,
        kind: OperationKind,
        content: impl Into<String>,
        metadata: Value,
    ) -> Option<OperationLogEntry> {
        self.record_at(kind, content, metadata, unix_millis_now())
            .await
    }

    pub async fn record_at(
        &self,
        kind: OperationKind,
        content: impl Into<String>,
        metadata: Value,
        now: i64,
    ) -> Option<OperationLogEntry> {
        let entry = OperationLogEntry {
            id: new_entry_id(now),
            kind,
            content: content.into(),
            timestamp: now,
            client: self.client.clone(),
            metadata,
            ip: self.ip_lookup.resolve().await,
            extra: serde_json::Map::new(),
        };

        match self.prepend(entry.clone()).await {
            Ok(()) => {
                tracing::debug!("Recorded {} operation", entry.kind);
                Some(entry)
            }
            Err(error) => {
                tracing::warn!("Failed to record {} operation: {}", entry.kind, error);
                None
            }
        }
    }

    async fn prepend(&self, entry: OperationLogEntry) -> Result<()> {
        let mut stored: StoredCollection<OperationLogEntry> =
            self.storage.get_collection(keys::OPERATION_LOGS).await?;
        stored.records.insert(0, entry);
        stored.records.truncate(MAX_LOG_ENTRIES);
        self.storage
            .set_collection(keys::OPERATION_LOGS, &stored)
            .await
    }

    /// Stored entries, newest first; empty when the log cannot be read
    pub async fn list(&self) -> Vec<OperationLogEntry> {
        match self.storage.get_collection(keys::OPERATION_LOGS).await {
            Ok(stored) => stored.records,
            Err(error) => {
                tracing::warn!("Failed to read operation log: {}", error);
                Vec::new()
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        let empty: StoredCollection<OperationLogEntry> = StoredCollection::default();
        self.storage
            .set_collection(keys::OPERATION_LOGS, &empty)
            .await
    }
}
