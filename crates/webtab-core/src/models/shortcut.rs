//! Shortcut, shortcut group, and the shortcut collection

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::record::{RecordId, StoredCollection, SyncMeta, SyncRecord};
use crate::error::{Error, Result};

/// A single link tile on the new-tab page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    /// Unique identifier
    pub id: RecordId,
    /// Display name
    pub name: String,
    /// Target URL
    pub url: String,
    /// Optional icon URL or data URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub meta: SyncMeta,
    /// Fields written by other clients, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Shortcut {
    /// Create a new live shortcut stamped at `now`
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>, now: i64) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            url: url.into(),
            icon: None,
            meta: SyncMeta::created(now),
            extra: Map::new(),
        }
    }
}

/// Serialized as `"isGroup": true`; only `true` deserializes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupFlag;

impl Serialize for GroupFlag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bool(true)
    }
}

impl<'de> Deserialize<'de> for GroupFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if bool::deserialize(deserializer)? {
            Ok(Self)
        } else {
            Err(D::Error::custom("isGroup must be true"))
        }
    }
}

/// A folder of two or more shortcuts.
///
/// A group is merged as one opaque record: its items are compared as part of
/// the group's content and never merged item by item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutGroup {
    pub id: RecordId,
    #[serde(rename = "isGroup")]
    pub is_group: GroupFlag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub items: Vec<Shortcut>,
    #[serde(flatten)]
    pub meta: SyncMeta,
    /// Fields written by other clients, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ShortcutGroup {
    fn live_item_count(&self) -> usize {
        self.items.iter().filter(|item| !item.meta.deleted).count()
    }
}

/// Top-level element of the shortcut collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShortcutEntry {
    /// A group of shortcuts (tried first: requires `isGroup` and `items`)
    Group(ShortcutGroup),
    /// A plain shortcut
    Link(Shortcut),
}

impl SyncRecord for ShortcutEntry {
    fn id(&self) -> &RecordId {
        match self {
            Self::Group(group) => &group.id,
            Self::Link(link) => &link.id,
        }
    }

    fn meta(&self) -> &SyncMeta {
        match self {
            Self::Group(group) => &group.meta,
            Self::Link(link) => &link.meta,
        }
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        match self {
            Self::Group(group) => &mut group.meta,
            Self::Link(link) => &mut link.meta,
        }
    }
}

impl SyncRecord for Shortcut {
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

/// Fields accepted when editing a shortcut; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
}

/// The shortcut collection as stored under the `shortcuts` key.
///
/// All mutations are soft: removed entries stay in the collection as
/// tombstones so the deletion can propagate to other devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutList {
    entries: Vec<ShortcutEntry>,
    undecoded: Vec<Value>,
}

impl ShortcutList {
    #[must_use]
    pub const fn new(entries: Vec<ShortcutEntry>) -> Self {
        Self {
            entries,
            undecoded: Vec::new(),
        }
    }

    pub fn from_stored(stored: StoredCollection<ShortcutEntry>) -> Self {
        Self {
            entries: stored.records,
            undecoded: stored.undecoded,
        }
    }

    /// Stored elements that are not shortcuts this client understands
    pub fn undecoded(&self) -> &[Value] {
        &self.undecoded
    }

    /// All entries, tombstones included
    pub fn entries(&self) -> &[ShortcutEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ShortcutEntry> {
        self.entries
    }

    /// Live entries as shown to the user; groups only list live items.
    pub fn visible(&self) -> Vec<ShortcutEntry> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_tombstone())
            .map(|entry| match entry {
                ShortcutEntry::Group(group) => {
                    let mut group = group.clone();
                    group.items.retain(|item| !item.meta.deleted);
                    ShortcutEntry::Group(group)
                }
                ShortcutEntry::Link(link) => ShortcutEntry::Link(link.clone()),
            })
            .collect()
    }

    /// Add a plain shortcut and return its id
    pub fn add(
        &mut self,
        name: impl Into<String>,
        url: impl Into<String>,
        icon: Option<String>,
        now: i64,
    ) -> RecordId {
        let mut shortcut = Shortcut::new(name, url, now);
        shortcut.icon = icon;
        let id = shortcut.id.clone();
        self.entries.push(ShortcutEntry::Link(shortcut));
        id
    }

    /// Edit a live shortcut, whether top-level or inside a live group.
    ///
    /// Editing a grouped shortcut also stamps the group, since groups are
    /// compared as a whole during merge.
    pub fn edit(&mut self, id: &RecordId, patch: ShortcutPatch, now: i64) -> Result<()> {
        if let Some(link) = self.live_link_mut(id) {
            apply_patch(link, patch, now);
            return Ok(());
        }

        for entry in &mut self.entries {
            let ShortcutEntry::Group(group) = entry else {
                continue;
            };
            if group.meta.deleted {
                continue;
            }
            if let Some(item) = group
                .items
                .iter_mut()
                .find(|item| &item.id == id && !item.meta.deleted)
            {
                apply_patch(item, patch, now);
                group.meta.touch(now);
                return Ok(());
            }
        }

        Err(Error::NotFound(format!("shortcut {id}")))
    }

    /// Delete a shortcut. Grouped shortcuts are removed from their group,
    /// which may collapse the group.
    pub fn delete(&mut self, id: &RecordId, now: i64) -> Result<()> {
        if let Some(link) = self.live_link_mut(id) {
            link.meta.mark_deleted(now);
            return Ok(());
        }

        let group_id = self
            .entries
            .iter()
            .find_map(|entry| match entry {
                ShortcutEntry::Group(group)
                    if !group.meta.deleted && group.items.iter().any(|item| &item.id == id) =>
                {
                    Some(group.id.clone())
                }
                _ => None,
            })
            .ok_or_else(|| Error::NotFound(format!("shortcut {id}")))?;

        let group = self.live_group_mut(&group_id)?;
        group.items.retain(|item| &item.id != id);
        group.meta.touch(now);
        self.collapse_group(&group_id, now)
    }

    /// Combine two or more live top-level shortcuts into a new group.
    ///
    /// The originals are tombstoned at the top level and copied into the group.
    pub fn create_group(
        &mut self,
        ids: &[RecordId],
        name: Option<String>,
        now: i64,
    ) -> Result<RecordId> {
        let mut unique: Vec<&RecordId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        if unique.len() < 2 {
            return Err(Error::InvalidInput(
                "a group needs at least two shortcuts".to_string(),
            ));
        }

        let mut items = Vec::with_capacity(unique.len());
        for id in &unique {
            let link = self
                .live_link_mut(id)
                .ok_or_else(|| Error::NotFound(format!("shortcut {id}")))?;
            let mut item = link.clone();
            item.meta = SyncMeta::created(now);
            items.push(item);
        }
        for id in unique {
            if let Some(link) = self.live_link_mut(id) {
                link.meta.mark_deleted(now);
            }
        }

        let group = ShortcutGroup {
            id: RecordId::new(),
            is_group: GroupFlag,
            name: name.and_then(|name| crate::util::normalize_text_option(Some(name))),
            items,
            meta: SyncMeta::created(now),
            extra: Map::new(),
        };
        let group_id = group.id.clone();
        self.entries.push(ShortcutEntry::Group(group));
        Ok(group_id)
    }

    /// Rename a live group; an empty name clears it
    pub fn rename_group(&mut self, group_id: &RecordId, name: &str, now: i64) -> Result<()> {
        let group = self.live_group_mut(group_id)?;
        group.name = crate::util::normalize_text_option(Some(name.to_string()));
        group.meta.touch(now);
        Ok(())
    }

    /// Move a live top-level shortcut into a live group
    pub fn add_to_group(
        &mut self,
        group_id: &RecordId,
        shortcut_id: &RecordId,
        now: i64,
    ) -> Result<()> {
        self.live_group_mut(group_id)?;
        let link = self
            .live_link_mut(shortcut_id)
            .ok_or_else(|| Error::NotFound(format!("shortcut {shortcut_id}")))?;
        let mut item = link.clone();
        link.meta.mark_deleted(now);
        item.meta = SyncMeta::created(now);

        let group = self.live_group_mut(group_id)?;
        group.items.retain(|existing| existing.id != item.id);
        group.items.push(item);
        group.meta.touch(now);
        Ok(())
    }

    /// Move a shortcut out of a group back to the top level.
    ///
    /// When this leaves one item, the group is tombstoned and that item also
    /// becomes a top-level shortcut with its own id.
    pub fn remove_from_group(
        &mut self,
        group_id: &RecordId,
        item_id: &RecordId,
        now: i64,
    ) -> Result<()> {
        let group = self.live_group_mut(group_id)?;
        let position = group
            .items
            .iter()
            .position(|item| &item.id == item_id)
            .ok_or_else(|| Error::NotFound(format!("shortcut {item_id} in group {group_id}")))?;
        let item = group.items.remove(position);
        group.meta.touch(now);

        self.restore_link(item, now);
        self.collapse_group(group_id, now)
    }

    /// Tombstone a group together with its items
    pub fn delete_group(&mut self, group_id: &RecordId, now: i64) -> Result<()> {
        let group = self.live_group_mut(group_id)?;
        group.meta.mark_deleted(now);
        Ok(())
    }

    /// Enforce the two-item minimum after a group lost items.
    ///
    /// A group left with one item is tombstoned and the item returns to the
    /// top level under its own id, so the group id stops resolving.
    fn collapse_group(&mut self, group_id: &RecordId, now: i64) -> Result<()> {
        let group = self.live_group_mut(group_id)?;
        match group.live_item_count() {
            0 => {
                group.meta.mark_deleted(now);
            }
            1 => {
                let remaining = group
                    .items
                    .iter()
                    .find(|item| !item.meta.deleted)
                    .cloned();
                group.meta.mark_deleted(now);
                if let Some(item) = remaining {
                    tracing::debug!("Group {} collapsed into shortcut {}", group_id, item.id);
                    self.restore_link(item, now);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Put a shortcut back at the top level, reviving its old tombstone if any.
    fn restore_link(&mut self, mut item: Shortcut, now: i64) {
        item.meta = SyncMeta::created(now);
        let existing = self.entries.iter_mut().find_map(|entry| match entry {
            ShortcutEntry::Link(link) if link.id == item.id => Some(link),
            _ => None,
        });
        match existing {
            Some(link) => *link = item,
            None => self.entries.push(ShortcutEntry::Link(item)),
        }
    }

    fn live_link_mut(&mut self, id: &RecordId) -> Option<&mut Shortcut> {
        self.entries.iter_mut().find_map(|entry| match entry {
            ShortcutEntry::Link(link) if &link.id == id && !link.meta.deleted => Some(link),
            _ => None,
        })
    }

    fn live_group_mut(&mut self, id: &RecordId) -> Result<&mut ShortcutGroup> {
        self.entries
            .iter_mut()
            .find_map(|entry| match entry {
                ShortcutEntry::Group(group) if &group.id == id && !group.meta.deleted => {
                    Some(group)
                }
                _ => None,
            })
            .ok_or_else(|| Error::NotFound(format!("group {id}")))
    }
}

fn apply_patch(link: &mut Shortcut, patch: ShortcutPatch, now: i64) {
    if let Some(name) = patch.name {
        link.name = name;
    }
    if let Some(url) = patch.url {
        link.url = url;
    }
    if let Some(icon) = patch.icon {
        link.icon = crate::util::normalize_text_option(Some(icon));
    }
    link.meta.touch(now);
}
