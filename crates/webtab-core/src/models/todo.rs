//! To-do item model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::{RecordId, StoredCollection, SyncMeta, SyncRecord};
use crate::error::{Error, Result};

/// A to-do item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Unique identifier
    pub id: RecordId,
    /// Item text
    pub text: String,
    /// Completion flag
    #[serde(default)]
    pub completed: bool,
    /// Creation timestamp (Unix ms)
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(flatten)]
    pub meta: SyncMeta,
    /// Fields written by other clients, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Todo {
    /// Create a new open to-do stamped at `now`
    #[must_use]
    pub fn new(text: impl Into<String>, now: i64) -> Self {
        Self {
            id: RecordId::new(),
            text: text.into(),
            completed: false,
            created_at: Some(now),
            meta: SyncMeta::created(now),
            extra: Map::new(),
        }
    }
}

impl SyncRecord for Todo {
    fn id(&self) -> &RecordId {
        &self.id
    }

    fn meta(&self) -> &SyncMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.meta
    }
}

/// The to-do collection as stored under the `todos` key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoList {
    items: Vec<Todo>,
    undecoded: Vec<Value>,
}

impl TodoList {
    #[must_use]
    pub const fn new(items: Vec<Todo>) -> Self {
        Self {
            items,
            undecoded: Vec::new(),
        }
    }

    pub fn from_stored(stored: StoredCollection<Todo>) -> Self {
        Self {
            items: stored.records,
            undecoded: stored.undecoded,
        }
    }

    /// Stored elements that are not to-dos this client understands
    pub fn undecoded(&self) -> &[Value] {
        &self.undecoded
    }

    pub fn items(&self) -> &[Todo] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Todo> {
        self.items
    }

    /// Live items, tombstones filtered out
    pub fn visible(&self) -> Vec<Todo> {
        self.items
            .iter()
            .filter(|todo| !todo.meta.deleted)
            .cloned()
            .collect()
    }

    /// Add an item; blank text is rejected
    pub fn add(&mut self, text: &str, now: i64) -> Result<RecordId> {
        let text = crate::util::normalize_text_option(Some(text.to_string()))
            .ok_or_else(|| Error::InvalidInput("to-do text cannot be empty".to_string()))?;
        let todo = Todo::new(text, now);
        let id = todo.id.clone();
        self.items.push(todo);
        Ok(id)
    }

    /// Flip completion and return the new state
    pub fn toggle(&mut self, id: &RecordId, now: i64) -> Result<bool> {
        let todo = self.live_mut(id)?;
        todo.completed = !todo.completed;
        todo.meta.touch(now);
        Ok(todo.completed)
    }

    pub fn edit(&mut self, id: &RecordId, text: &str, now: i64) -> Result<()> {
        let text = crate::util::normalize_text_option(Some(text.to_string()))
            .ok_or_else(|| Error::InvalidInput("to-do text cannot be empty".to_string()))?;
        let todo = self.live_mut(id)?;
        todo.text = text;
        todo.meta.touch(now);
        Ok(())
    }

    /// Soft delete
    pub fn delete(&mut self, id: &RecordId, now: i64) -> Result<()> {
        self.live_mut(id)?.meta.mark_deleted(now);
        Ok(())
    }

    fn live_mut(&mut self, id: &RecordId) -> Result<&mut Todo> {
        self.items
            .iter_mut()
            .find(|todo| &todo.id == id && !todo.meta.deleted)
            .ok_or_else(|| Error::NotFound(format!("to-do {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_todo_new() {
        let todo = Todo::new("Write tests", 100);
        assert!(!todo.completed);
        assert!(!todo.meta.deleted);
        assert_eq!(todo.created_at, Some(100));
        assert_eq!(todo.meta.updated_at, Some(100));
    }

    #[test]
    fn test_legacy_numeric_todo_parses() {
        let todo: Todo =
            serde_json::from_value(json!({"id": 1, "text": "x", "completed": false})).unwrap();
        assert_eq!(todo.id, RecordId::Number(1));
        assert_eq!(todo.meta.updated_at, None);
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let stored = json!({
            "id": 1, "text": "x", "completed": false, "updatedAt": 10,
            "priority": "high", "tags": ["home"]
        });
        let todo: Todo = serde_json::from_value(stored.clone()).unwrap();
        assert_eq!(todo.meta.updated_at, Some(10));
        assert_eq!(todo.extra.get("priority"), Some(&json!("high")));
        assert!(!todo.extra.contains_key("updatedAt"));
        assert_eq!(serde_json::to_value(&todo).unwrap(), stored);
    }

    #[test]
    fn test_add_rejects_blank_text() {
        let mut list = TodoList::default();
        assert!(list.add("   ", 1).is_err());
        assert!(list.items().is_empty());
    }

    #[test]
    fn test_toggle_and_delete() {
        let mut list = TodoList::default();
        let id = list.add("ship it", 1).unwrap();

        assert!(list.toggle(&id, 2).unwrap());
        assert_eq!(list.items()[0].meta.updated_at, Some(2));

        list.delete(&id, 3).unwrap();
        assert!(list.visible().is_empty());
        assert_eq!(list.items().len(), 1);
        assert!(matches!(list.toggle(&id, 4), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_edit_updates_text() {
        let mut list = TodoList::default();
        let id = list.add("draft", 1).unwrap();
        list.edit(&id, " final ", 5).unwrap();
        assert_eq!(list.items()[0].text, "final");
        assert_eq!(list.items()[0].meta.updated_at, Some(5));
    }
}
