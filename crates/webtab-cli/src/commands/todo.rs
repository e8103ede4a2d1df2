use serde_json::json;
use webtab_core::models::{OperationKind, TodoList};
use webtab_core::util::unix_millis_now;
use webtab_core::StorageCoordinator;

use crate::commands::common::{format_todo_lines, join_text, operation_logger, parse_record_id};
use crate::error::CliError;

pub async fn run_list(
    coordinator: &StorageCoordinator,
    include_deleted: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let todos = coordinator.todos().await?;
    let items = if include_deleted {
        todos.into_items()
    } else {
        todos.visible()
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Nothing to do.");
        return Ok(());
    }
    for line in format_todo_lines(&items) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_add(coordinator: &StorageCoordinator, text: &[String]) -> Result<(), CliError> {
    let text = join_text(text)?;
    let mut todos = coordinator.todos().await?;
    let id = todos.add(&text, unix_millis_now())?;
    coordinator.save_todos(&todos).await?;

    operation_logger(coordinator)
        .record(OperationKind::AddTodo, text, json!({ "id": id }))
        .await;
    println!("{id}");
    Ok(())
}

pub async fn run_toggle(coordinator: &StorageCoordinator, id: &str) -> Result<(), CliError> {
    let id = parse_record_id(id)?;
    let mut todos = coordinator.todos().await?;
    let completed = todos.toggle(&id, unix_millis_now())?;
    coordinator.save_todos(&todos).await?;

    operation_logger(coordinator)
        .record(
            OperationKind::ToggleTodo,
            todo_text(&todos, &id.to_string()),
            json!({ "id": id, "completed": completed }),
        )
        .await;
    println!(
        "{id} marked {}",
        if completed { "done" } else { "not done" }
    );
    Ok(())
}

/// Edits are not a logged operation kind
pub async fn run_edit(
    coordinator: &StorageCoordinator,
    id: &str,
    text: &[String],
) -> Result<(), CliError> {
    let id = parse_record_id(id)?;
    let text = join_text(text)?;
    let mut todos = coordinator.todos().await?;
    todos.edit(&id, &text, unix_millis_now())?;
    coordinator.save_todos(&todos).await?;
    println!("Updated {id}");
    Ok(())
}

pub async fn run_delete(coordinator: &StorageCoordinator, id: &str) -> Result<(), CliError> {
    let id = parse_record_id(id)?;
    let mut todos = coordinator.todos().await?;
    let text = todo_text(&todos, &id.to_string());
    todos.delete(&id, unix_millis_now())?;
    coordinator.save_todos(&todos).await?;

    operation_logger(coordinator)
        .record(OperationKind::DeleteTodo, text, json!({ "id": id }))
        .await;
    println!("Deleted {id}");
    Ok(())
}

fn todo_text(todos: &TodoList, id: &str) -> String {
    todos
        .items()
        .iter()
        .find(|todo| todo.id.to_string() == id)
        .map_or_else(|| id.to_string(), |todo| todo.text.clone())
}
