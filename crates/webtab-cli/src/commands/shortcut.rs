use serde_json::json;
use webtab_core::models::{OperationKind, ShortcutEntry, ShortcutList, ShortcutPatch};
use webtab_core::util::{normalize_text_option, unix_millis_now};
use webtab_core::StorageCoordinator;

use crate::commands::common::{format_shortcut_lines, operation_logger, parse_record_id};
use crate::error::CliError;

pub async fn run_list(
    coordinator: &StorageCoordinator,
    include_deleted: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let shortcuts = coordinator.shortcuts().await?;
    let entries = if include_deleted {
        shortcuts.into_entries()
    } else {
        shortcuts.visible()
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No shortcuts yet.");
        return Ok(());
    }
    for line in format_shortcut_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_add(
    coordinator: &StorageCoordinator,
    name: &str,
    url: &str,
    icon: Option<String>,
) -> Result<(), CliError> {
    let name = normalize_text_option(Some(name.to_string())).ok_or(CliError::EmptyText)?;
    let url = normalize_text_option(Some(url.to_string())).ok_or(CliError::EmptyText)?;

    let mut shortcuts = coordinator.shortcuts().await?;
    let id = shortcuts.add(
        name.clone(),
        url.clone(),
        normalize_text_option(icon),
        unix_millis_now(),
    );
    coordinator.save_shortcuts(&shortcuts).await?;

    operation_logger(coordinator)
        .record(
            OperationKind::AddShortcut,
            format!("{name} ({url})"),
            json!({ "id": id, "name": name, "url": url }),
        )
        .await;
    println!("{id}");
    Ok(())
}

pub async fn run_edit(
    coordinator: &StorageCoordinator,
    id: &str,
    patch: ShortcutPatch,
) -> Result<(), CliError> {
    let id = parse_record_id(id)?;
    if patch == ShortcutPatch::default() {
        return Err(CliError::EmptyPatch);
    }

    let mut shortcuts = coordinator.shortcuts().await?;
    shortcuts.edit(&id, patch.clone(), unix_millis_now())?;
    coordinator.save_shortcuts(&shortcuts).await?;

    operation_logger(coordinator)
        .record(
            OperationKind::EditShortcut,
            describe(&shortcuts, &id.to_string()),
            json!({ "id": id, "name": patch.name, "url": patch.url, "icon": patch.icon }),
        )
        .await;
    println!("Updated {id}");
    Ok(())
}

pub async fn run_delete(coordinator: &StorageCoordinator, id: &str) -> Result<(), CliError> {
    let id = parse_record_id(id)?;
    let mut shortcuts = coordinator.shortcuts().await?;
    let label = describe(&shortcuts, &id.to_string());
    shortcuts.delete(&id, unix_millis_now())?;
    coordinator.save_shortcuts(&shortcuts).await?;

    operation_logger(coordinator)
        .record(OperationKind::DeleteShortcut, label, json!({ "id": id }))
        .await;
    println!("Deleted {id}");
    Ok(())
}

pub async fn run_group(
    coordinator: &StorageCoordinator,
    ids: &[String],
    name: Option<String>,
) -> Result<(), CliError> {
    let ids = ids
        .iter()
        .map(|id| parse_record_id(id))
        .collect::<Result<Vec<_>, _>>()?;

    let mut shortcuts = coordinator.shortcuts().await?;
    let group_id = shortcuts.create_group(&ids, name.clone(), unix_millis_now())?;
    coordinator.save_shortcuts(&shortcuts).await?;

    operation_logger(coordinator)
        .record(
            OperationKind::CreateGroup,
            name.unwrap_or_else(|| "Group".to_string()),
            json!({ "id": group_id, "items": ids }),
        )
        .await;
    println!("{group_id}");
    Ok(())
}

pub async fn run_rename_group(
    coordinator: &StorageCoordinator,
    id: &str,
    name: &str,
) -> Result<(), CliError> {
    let id = parse_record_id(id)?;
    let mut shortcuts = coordinator.shortcuts().await?;
    shortcuts.rename_group(&id, name, unix_millis_now())?;
    coordinator.save_shortcuts(&shortcuts).await?;

    operation_logger(coordinator)
        .record(
            OperationKind::EditGroupName,
            name.trim(),
            json!({ "id": id, "name": name.trim() }),
        )
        .await;
    println!("Renamed {id}");
    Ok(())
}

pub async fn run_add_to_group(
    coordinator: &StorageCoordinator,
    group_id: &str,
    shortcut_id: &str,
) -> Result<(), CliError> {
    let group_id = parse_record_id(group_id)?;
    let shortcut_id = parse_record_id(shortcut_id)?;

    let mut shortcuts = coordinator.shortcuts().await?;
    let label = describe(&shortcuts, &shortcut_id.to_string());
    shortcuts.add_to_group(&group_id, &shortcut_id, unix_millis_now())?;
    coordinator.save_shortcuts(&shortcuts).await?;

    operation_logger(coordinator)
        .record(
            OperationKind::AddToGroup,
            label,
            json!({ "groupId": group_id, "id": shortcut_id }),
        )
        .await;
    println!("Moved {shortcut_id} into {group_id}");
    Ok(())
}

pub async fn run_ungroup_item(
    coordinator: &StorageCoordinator,
    group_id: &str,
    item_id: &str,
) -> Result<(), CliError> {
    let group_id = parse_record_id(group_id)?;
    let item_id = parse_record_id(item_id)?;

    let mut shortcuts = coordinator.shortcuts().await?;
    let label = describe(&shortcuts, &item_id.to_string());
    shortcuts.remove_from_group(&group_id, &item_id, unix_millis_now())?;
    coordinator.save_shortcuts(&shortcuts).await?;

    operation_logger(coordinator)
        .record(
            OperationKind::RemoveFromGroup,
            label,
            json!({ "groupId": group_id, "id": item_id }),
        )
        .await;
    println!("Moved {item_id} out of {group_id}");
    Ok(())
}

pub async fn run_delete_group(coordinator: &StorageCoordinator, id: &str) -> Result<(), CliError> {
    let id = parse_record_id(id)?;
    let mut shortcuts = coordinator.shortcuts().await?;
    let label = describe(&shortcuts, &id.to_string());
    shortcuts.delete_group(&id, unix_millis_now())?;
    coordinator.save_shortcuts(&shortcuts).await?;

    operation_logger(coordinator)
        .record(OperationKind::DeleteGroup, label, json!({ "id": id }))
        .await;
    println!("Deleted group {id}");
    Ok(())
}

/// Display name of a shortcut or group anywhere in the list, or the id itself
pub fn describe(shortcuts: &ShortcutList, id: &str) -> String {
    for entry in shortcuts.entries() {
        match entry {
            ShortcutEntry::Link(link) if link.id.to_string() == id => return link.name.clone(),
            ShortcutEntry::Group(group) => {
                if group.id.to_string() == id {
                    return group.name.clone().unwrap_or_else(|| "Group".to_string());
                }
                if let Some(item) = group.items.iter().find(|item| item.id.to_string() == id) {
                    return item.name.clone();
                }
            }
            ShortcutEntry::Link(_) => {}
        }
    }
    id.to_string()
}
