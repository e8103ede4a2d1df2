use webtab_core::util::unix_millis_now;
use webtab_core::StorageCoordinator;

use crate::commands::common::{format_log_lines, log_to_list_item, operation_logger, LogListItem};
use crate::error::CliError;

pub async fn run_log_list(
    coordinator: &StorageCoordinator,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let mut entries = operation_logger(coordinator).list().await;
    entries.truncate(limit);

    if as_json {
        let json_items = entries
            .iter()
            .map(log_to_list_item)
            .collect::<Vec<LogListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No operations recorded.");
        return Ok(());
    }
    for line in format_log_lines(&entries, unix_millis_now()) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_log_clear(coordinator: &StorageCoordinator) -> Result<(), CliError> {
    operation_logger(coordinator).clear().await?;
    println!("Operation log cleared");
    Ok(())
}
