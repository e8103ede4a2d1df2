//! Record identity and sync metadata shared by every synced collection

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a shortcut, group, or to-do.
///
/// Older clients stamp numeric millisecond ids; newer ones use UUID v7
/// strings. Both forms round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Numeric id (legacy `Date.now()` style)
    Number(i64),
    /// String id
    Text(String),
}

impl RecordId {
    /// Create a new unique, time-sortable record ID
    #[must_use]
    pub fn new() -> Self {
        Self::Text(Uuid::now_v7().to_string())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(trimmed
            .parse::<i64>()
            .map_or_else(|_| Self::Text(trimmed.to_string()), Self::Number))
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

/// Sync bookkeeping carried by every record.
///
/// Flattened into the record's JSON as `updatedAt`, `deleted`, `deletedAt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// Wall-clock time (Unix ms) of the last mutation or merge
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Tombstone flag
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
    /// Wall-clock time (Unix ms) of the deletion
    #[serde(rename = "deletedAt", default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl SyncMeta {
    /// Metadata for a record created at `now`.
    #[must_use]
    pub const fn created(now: i64) -> Self {
        Self {
            updated_at: Some(now),
            deleted: false,
            deleted_at: None,
        }
    }

    /// Record a mutation at `now`.
    pub fn touch(&mut self, now: i64) {
        self.updated_at = Some(now);
    }

    /// Turn the record into a tombstone deleted at `now`.
    pub fn mark_deleted(&mut self, now: i64) {
        self.deleted = true;
        self.deleted_at = Some(now);
        self.updated_at = Some(now);
    }

    /// Clear the tombstone, keeping `updated_at` as is.
    pub fn revive(&mut self) {
        self.deleted = false;
        self.deleted_at = None;
    }
}

/// A record that participates in last-write-wins merging.
pub trait SyncRecord: Clone + PartialEq {
    /// Stable identifier, unique within the collection.
    fn id(&self) -> &RecordId;

    fn meta(&self) -> &SyncMeta;

    fn meta_mut(&mut self) -> &mut SyncMeta;

    /// Whether this record is a tombstone.
    fn is_tombstone(&self) -> bool {
        self.meta().deleted
    }

    /// Compare domain content, ignoring `updatedAt`, `deleted` and `deletedAt`.
    fn same_content(&self, other: &Self) -> bool {
        let mut left = self.clone();
        let mut right = other.clone();
        *left.meta_mut() = SyncMeta::default();
        *right.meta_mut() = SyncMeta::default();
        left == right
    }
}

/// A stored JSON array split into typed records and the elements that did
/// not decode.
///
/// Undecoded elements (written by another client in a shape this one cannot
/// read) are carried along and written back after the records, so loading
/// and saving a collection never loses data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCollection<T> {
    pub records: Vec<T>,
    pub undecoded: Vec<Value>,
}

impl<T> Default for StoredCollection<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T> StoredCollection<T> {
    #[must_use]
    pub const fn new(records: Vec<T>) -> Self {
        Self {
            records,
            undecoded: Vec::new(),
        }
    }
}

impl<T: DeserializeOwned> StoredCollection<T> {
    /// Decode a stored value.
    ///
    /// `None`, `null` and non-array values decode to an empty collection.
    pub fn decode(value: Option<Value>, label: &str) -> Self {
        let items = match value {
            None | Some(Value::Null) => return Self::default(),
            Some(Value::Array(items)) => items,
            Some(other) => {
                tracing::warn!(
                    "Ignoring non-array value stored for {}: {}",
                    label,
                    crate::util::compact_text(&other.to_string())
                );
                return Self::default();
            }
        };

        let mut collection = Self::new(Vec::with_capacity(items.len()));
        for item in items {
            match serde_json::from_value::<T>(item.clone()) {
                Ok(record) => collection.records.push(record),
                Err(error) => {
                    tracing::warn!("Keeping undecodable {} element as is: {}", label, error);
                    collection.undecoded.push(item);
                }
            }
        }
        collection
    }
}

impl<T: Serialize> StoredCollection<T> {
    pub fn to_value(&self) -> serde_json::Result<Value> {
        encode_collection(&self.records, &self.undecoded)
    }
}

/// Records followed by the undecoded elements, as one JSON array
pub fn encode_collection<T: Serialize>(
    records: &[T],
    undecoded: &[Value],
) -> serde_json::Result<Value> {
    let mut items = Vec::with_capacity(records.len() + undecoded.len());
    for record in records {
        items.push(serde_json::to_value(record)?);
    }
    items.extend(undecoded.iter().cloned());
    Ok(Value::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_accepts_numbers_and_strings() {
        let numeric: RecordId = serde_json::from_value(json!(1_700_000_000_000_i64)).unwrap();
        assert_eq!(numeric, RecordId::Number(1_700_000_000_000));

        let text: RecordId = serde_json::from_value(json!("abc")).unwrap();
        assert_eq!(text, RecordId::Text("abc".to_string()));
        assert_eq!(serde_json::to_value(&text).unwrap(), json!("abc"));
    }

    #[test]
    fn test_record_id_parse() {
        assert_eq!("42".parse::<RecordId>().unwrap(), RecordId::Number(42));
        assert_eq!(
            " x-1 ".parse::<RecordId>().unwrap(),
            RecordId::Text("x-1".to_string())
        );
    }

    #[test]
    fn test_record_id_unique() {
        assert_ne!(RecordId::new(), RecordId::new());
    }

    #[test]
    fn test_sync_meta_omits_defaults() {
        let meta = SyncMeta::default();
        assert_eq!(serde_json::to_value(meta).unwrap(), json!({}));

        let mut deleted = SyncMeta::created(10);
        deleted.mark_deleted(20);
        assert_eq!(
            serde_json::to_value(deleted).unwrap(),
            json!({"updatedAt": 20, "deleted": true, "deletedAt": 20})
        );
    }

    #[test]
    fn test_revive_clears_tombstone() {
        let mut meta = SyncMeta::created(1);
        meta.mark_deleted(5);
        meta.revive();
        assert!(!meta.deleted);
        assert_eq!(meta.deleted_at, None);
        assert_eq!(meta.updated_at, Some(5));
    }

    #[test]
    fn test_undecodable_elements_survive_a_round_trip() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Item {
            id: RecordId,
        }

        let value = json!([{"id": 1}, {"nope": true}, {"id": "b"}]);
        let collection: StoredCollection<Item> = StoredCollection::decode(Some(value), "items");
        assert_eq!(collection.records.len(), 2);
        assert_eq!(collection.undecoded, vec![json!({"nope": true})]);
        assert_eq!(
            collection.to_value().unwrap(),
            json!([{"id": 1}, {"id": "b"}, {"nope": true}])
        );

        let empty: StoredCollection<Item> = StoredCollection::decode(Some(json!({"id": 1})), "items");
        assert_eq!(empty, StoredCollection::default());
        let none: StoredCollection<Item> = StoredCollection::decode(None, "items");
        assert!(none.records.is_empty());
    }
}
