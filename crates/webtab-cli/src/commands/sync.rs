use webtab_core::StorageCoordinator;

use crate::commands::common::format_sync_report;
use crate::error::CliError;

pub async fn run_pull(coordinator: &StorageCoordinator, as_json: bool) -> Result<(), CliError> {
    let report = coordinator.sync_from_remote().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_sync_report(&report) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_push(coordinator: &StorageCoordinator) -> Result<(), CliError> {
    if !coordinator.storage().is_remote_enabled() {
        return Err(CliError::MissingToken);
    }

    let report = coordinator.sync_to_remote().await;
    if report.is_empty() {
        println!("Nothing to push");
    } else {
        println!(
            "Pushed {} change(s), {} failed",
            report.applied, report.failed
        );
    }
    Ok(())
}
