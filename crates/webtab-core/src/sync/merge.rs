//! Last-write-wins merge of local and remote collections

use indexmap::IndexMap;
use serde_json::Value;

use crate::models::{OperationLogEntry, RecordId, SyncRecord, MAX_LOG_ENTRIES};

/// Merge two versions of a collection, record by record.
///
/// Tombstones take part in the merge so deletions propagate. A record found
/// on both sides is resolved and stamped `updatedAt = now`; a record found on
/// one side only keeps its timestamp (or gets `now` when it had none). Output
/// order is first appearance: local records, then remote-only records.
pub fn merge_records<T: SyncRecord>(local: Vec<T>, remote: Vec<T>, now: i64) -> Vec<T> {
    let mut merged: IndexMap<RecordId, T> = IndexMap::with_capacity(local.len() + remote.len());

    for record in local {
        merged.insert(record.id().clone(), kept(record, now));
    }

    for remote_record in remote {
        let id = remote_record.id().clone();
        let resolved = match merged.get(&id) {
            None => kept(remote_record, now),
            Some(local_record) => resolve(local_record, remote_record, now),
        };
        merged.insert(id, resolved);
    }

    merged.into_values().collect()
}

fn resolve<T: SyncRecord>(local: &T, remote: T, now: i64) -> T {
    let local_meta = *local.meta();
    let remote_meta = *remote.meta();

    match (local.is_tombstone(), remote.is_tombstone()) {
        // Both deleted: the later deletion wins
        (true, true) => {
            if remote_meta.deleted_at.unwrap_or(0) > local_meta.deleted_at.unwrap_or(0) {
                stamped(remote, now)
            } else {
                stamped(local.clone(), now)
            }
        }
        // Deleted here, edited there: an edit after the deletion resurrects
        (true, false) => {
            if remote_meta.updated_at.unwrap_or(0) > local_meta.deleted_at.unwrap_or(0) {
                let mut revived = stamped(remote, now);
                revived.meta_mut().revive();
                revived
            } else {
                stamped(local.clone(), now)
            }
        }
        (false, true) => {
            if local_meta.updated_at.unwrap_or(0) > remote_meta.deleted_at.unwrap_or(0) {
                stamped(local.clone(), now)
            } else {
                stamped(remote, now)
            }
        }
        (false, false) => {
            if local.same_content(&remote)
                || remote_meta.updated_at.unwrap_or(0) <= local_meta.updated_at.unwrap_or(0)
            {
                stamped(local.clone(), now)
            } else {
                stamped(remote, now)
            }
        }
    }
}

fn kept<T: SyncRecord>(mut record: T, now: i64) -> T {
    let meta = record.meta_mut();
    meta.updated_at = Some(meta.updated_at.unwrap_or(now));
    record
}

fn stamped<T: SyncRecord>(mut record: T, now: i64) -> T {
    record.meta_mut().updated_at = Some(now);
    record
}

/// Union of the raw elements neither side could decode: local ones first,
/// then remote ones not already present.
pub fn merge_undecoded(mut local: Vec<Value>, remote: Vec<Value>) -> Vec<Value> {
    for value in remote {
        if !local.contains(&value) {
            local.push(value);
        }
    }
    local
}

/// Union of two operation logs.
///
/// Entries are matched by id; the one with the larger timestamp wins.
/// Entries without an id are dropped. The result is sorted newest first and
/// capped at [`MAX_LOG_ENTRIES`].
pub fn merge_operation_logs(
    local: Vec<OperationLogEntry>,
    remote: Vec<OperationLogEntry>,
) -> Vec<OperationLogEntry> {
    let mut merged: IndexMap<String, OperationLogEntry> = IndexMap::new();

    for entry in local.into_iter().chain(remote) {
        if entry.id.trim().is_empty() {
            continue;
        }
        match merged.get(&entry.id) {
            Some(existing) if existing.timestamp >= entry.timestamp => {}
            _ => {
                merged.insert(entry.id.clone(), entry);
            }
        }
    }

    let mut entries: Vec<OperationLogEntry> = merged.into_values().collect();
    entries.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
    entries.truncate(MAX_LOG_ENTRIES);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ClientInfo, OperationKind, Shortcut, ShortcutEntry, SyncMeta, Todo, UNKNOWN,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Map};

    const NOW: i64 = 10_000;

    fn todo(id: i64, text: &str, meta: SyncMeta) -> Todo {
        Todo {
            id: RecordId::Number(id),
            text: text.to_string(),
            completed: false,
            created_at: None,
            meta,
            extra: Map::new(),
        }
    }

    fn live(updated_at: i64) -> SyncMeta {
        SyncMeta::created(updated_at)
    }

    fn tombstone(deleted_at: i64) -> SyncMeta {
        let mut meta = SyncMeta::created(deleted_at);
        meta.mark_deleted(deleted_at);
        meta
    }

    fn log(id: &str, timestamp: i64, content: &str) -> OperationLogEntry {
        OperationLogEntry {
            id: id.to_string(),
            kind: OperationKind::AddTodo,
            content: content.to_string(),
            timestamp,
            client: ClientInfo::default(),
            metadata: Value::Null,
            ip: UNKNOWN.to_string(),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_disjoint_collections_union() {
        let merged = merge_records(
            vec![todo(1, "local", live(100))],
            vec![todo(2, "remote", live(200))],
            NOW,
        );

        let ids: Vec<_> = merged.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec![RecordId::Number(1), RecordId::Number(2)]);
        // One-sided records keep their timestamps
        assert_eq!(merged[0].meta.updated_at, Some(100));
        assert_eq!(merged[1].meta.updated_at, Some(200));
    }

    #[test]
    fn test_remote_only_record_keeps_its_timestamp() {
        let merged = merge_records(Vec::new(), vec![todo(2, "remote", live(20))], NOW);
        assert_eq!(merged[0].meta.updated_at, Some(20));

        let merged = merge_records(Vec::new(), vec![todo(2, "remote", SyncMeta::default())], NOW);
        assert_eq!(merged[0].meta.updated_at, Some(NOW));
    }

    #[test]
    fn test_pulled_stale_record_loses_to_later_deletion() {
        // Pulled at 1000 from a gist, the record was last edited at 50
        let pulled = merge_records(Vec::new(), vec![todo(1, "stale", live(50))], 1_000);
        // Another client deleted it at 500
        let merged = merge_records(pulled, vec![todo(1, "stale", tombstone(500))], 2_000);
        assert!(merged[0].meta.deleted);
        assert_eq!(merged[0].meta.deleted_at, Some(500));
    }

    #[test]
    fn test_local_record_without_timestamp_gets_now() {
        let merged = merge_records(vec![todo(1, "old", SyncMeta::default())], Vec::new(), NOW);
        assert_eq!(merged[0].meta.updated_at, Some(NOW));
    }

    #[test]
    fn test_newer_remote_edit_wins() {
        let merged = merge_records(
            vec![todo(1, "mine", live(100))],
            vec![todo(1, "theirs", live(200))],
            NOW,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "theirs");
        assert_eq!(merged[0].meta.updated_at, Some(NOW));
    }

    #[test]
    fn test_equal_timestamps_keep_local() {
        let merged = merge_records(
            vec![todo(1, "mine", live(100))],
            vec![todo(1, "theirs", live(100))],
            NOW,
        );
        assert_eq!(merged[0].text, "mine");
    }

    #[test]
    fn test_identical_content_keeps_local_despite_newer_remote() {
        let local = todo(1, "same", live(100));
        let remote = todo(1, "same", live(500));
        let merged = merge_records(vec![local], vec![remote], NOW);
        assert_eq!(merged[0].text, "same");
        assert_eq!(merged[0].meta.updated_at, Some(NOW));
    }

    #[test]
    fn test_later_deletion_wins_over_earlier_edit() {
        let merged = merge_records(
            vec![todo(1, "x", live(100))],
            vec![todo(1, "x", tombstone(200))],
            NOW,
        );
        assert!(merged[0].meta.deleted);
        assert_eq!(merged[0].meta.deleted_at, Some(200));
        assert_eq!(merged[0].meta.updated_at, Some(NOW));
    }

    #[test]
    fn test_local_edit_after_remote_deletion_survives() {
        let merged = merge_records(
            vec![todo(1, "edited", live(300))],
            vec![todo(1, "x", tombstone(200))],
            NOW,
        );
        assert!(!merged[0].meta.deleted);
        assert_eq!(merged[0].text, "edited");
    }

    #[test]
    fn test_remote_edit_after_local_deletion_resurrects() {
        let merged = merge_records(
            vec![todo(1, "x", tombstone(100))],
            vec![todo(1, "edited", live(200))],
            NOW,
        );
        assert!(!merged[0].meta.deleted);
        assert_eq!(merged[0].meta.deleted_at, None);
        assert_eq!(merged[0].text, "edited");
        assert_eq!(merged[0].meta.updated_at, Some(NOW));
    }

    #[test]
    fn test_stale_remote_edit_does_not_resurrect() {
        let merged = merge_records(
            vec![todo(1, "x", tombstone(300))],
            vec![todo(1, "edited", live(200))],
            NOW,
        );
        assert!(merged[0].meta.deleted);
        assert_eq!(merged[0].text, "x");
    }

    #[test]
    fn test_later_of_two_deletions_wins() {
        let merged = merge_records(
            vec![todo(1, "local", tombstone(100))],
            vec![todo(1, "remote", tombstone(200))],
            NOW,
        );
        assert_eq!(merged[0].text, "remote");
        assert_eq!(merged[0].meta.deleted_at, Some(200));

        let merged = merge_records(
            vec![todo(1, "local", tombstone(200))],
            vec![todo(1, "remote", tombstone(200))],
            NOW,
        );
        assert_eq!(merged[0].text, "local");
    }

    #[test]
    fn test_tombstones_are_never_dropped() {
        let merged = merge_records(
            vec![todo(1, "a", tombstone(100)), todo(2, "b", live(100))],
            vec![todo(3, "c", tombstone(50))],
            NOW,
        );
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.iter().filter(|t| t.meta.deleted).count(), 2);
    }

    #[test]
    fn test_merge_against_same_input_is_stable() {
        let local = vec![todo(1, "a", live(100)), todo(2, "b", tombstone(150))];
        let remote = vec![todo(1, "a2", live(200)), todo(3, "c", live(120))];

        let once = merge_records(local.clone(), remote.clone(), NOW);
        let against_local = merge_records(once.clone(), local, NOW + 1);
        let against_remote = merge_records(once.clone(), remote, NOW + 1);

        let content = |records: &[Todo]| {
            records
                .iter()
                .map(|t| (t.id.clone(), t.text.clone(), t.meta.deleted))
                .collect::<Vec<_>>()
        };
        assert_eq!(content(&once), content(&against_local));
        assert_eq!(content(&once), content(&against_remote));
        // Remote-only record 3 kept its own timestamp
        assert_eq!(once[2].meta.updated_at, Some(120));
    }

    #[test]
    fn test_unknown_fields_survive_merge() {
        let local: Todo = serde_json::from_value(json!({
            "id": 1, "text": "a", "completed": false, "updatedAt": 100, "priority": "high"
        }))
        .unwrap();
        let remote: Todo = serde_json::from_value(json!({
            "id": 2, "text": "b", "completed": false, "updatedAt": 100, "tags": ["x"]
        }))
        .unwrap();

        let merged = merge_records(vec![local], vec![remote], NOW);
        let written = serde_json::to_value(&merged).unwrap();
        assert_eq!(written[0]["priority"], json!("high"));
        assert_eq!(written[1]["tags"], json!(["x"]));
    }

    #[test]
    fn test_undecoded_elements_union_without_duplicates() {
        let merged = merge_undecoded(
            vec![json!("note"), json!(42)],
            vec![json!(42), json!({"broken": true})],
        );
        assert_eq!(merged, vec![json!("note"), json!(42), json!({"broken": true})]);
    }

    #[test]
    fn test_shortcut_groups_merge_as_opaque_records() {
        let local: ShortcutEntry =
            serde_json::from_value(serde_json::json!({
                "id": 7, "isGroup": true, "name": "Dev", "updatedAt": 100,
                "items": [{"id": 1, "name": "A", "url": "https://a"}]
            }))
            .unwrap();
        let remote: ShortcutEntry =
            serde_json::from_value(serde_json::json!({
                "id": 7, "isGroup": true, "name": "Dev", "updatedAt": 200,
                "items": [{"id": 2, "name": "B", "url": "https://b"}]
            }))
            .unwrap();

        let merged = merge_records(vec![local], vec![remote.clone()], NOW);
        let ShortcutEntry::Group(group) = &merged[0] else {
            panic!("expected a group");
        };
        let ShortcutEntry::Group(expected) = remote else {
            unreachable!()
        };
        assert_eq!(group.items, expected.items);

        let link = ShortcutEntry::Link(Shortcut::new("A", "https://a", 1));
        assert_eq!(merge_records(vec![link.clone()], Vec::new(), NOW), vec![link]);
    }

    #[test]
    fn test_log_merge_unions_and_sorts_newest_first() {
        let merged = merge_operation_logs(
            vec![log("a", 100, "local a"), log("b", 300, "b")],
            vec![log("a", 200, "remote a"), log("c", 250, "c"), log("", 999, "no id")],
        );

        let ids: Vec<_> = merged.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(merged[2].content, "remote a");
    }

    #[test]
    fn test_log_merge_keeps_local_on_timestamp_tie() {
        let merged = merge_operation_logs(vec![log("a", 100, "local")], vec![log("a", 100, "remote")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].content, "local");
    }

    #[test]
    fn test_log_merge_caps_entries() {
        let local: Vec<_> = (0..800).map(|i| log(&format!("l{i}"), i, "")).collect();
        let remote: Vec<_> = (0..800).map(|i| log(&format!("r{i}"), 1000 + i, "")).collect();

        let merged = merge_operation_logs(local, remote);
        assert_eq!(merged.len(), MAX_LOG_ENTRIES);
        assert_eq!(merged[0].id, "r799");
        assert!(merged
            .windows(2)
            .all(|pair| pair[0].timestamp >= pair[1].timestamp));
    }
}
