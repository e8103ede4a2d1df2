use webtab_core::StorageCoordinator;

use crate::commands::common::{normalize_key, parse_value};
use crate::error::CliError;

pub async fn run_get(coordinator: &StorageCoordinator, key: &str) -> Result<(), CliError> {
    let key = normalize_key(key)?;
    match coordinator.get(&key).await? {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => eprintln!("No value stored under '{key}'"),
    }
    Ok(())
}

pub async fn run_set(
    coordinator: &StorageCoordinator,
    key: &str,
    raw_value: &str,
) -> Result<(), CliError> {
    let key = normalize_key(key)?;
    coordinator.set(&key, parse_value(raw_value)).await?;
    println!("Stored '{key}'");
    Ok(())
}

pub async fn run_remove(coordinator: &StorageCoordinator, key: &str) -> Result<(), CliError> {
    let key = normalize_key(key)?;
    coordinator.remove(&key).await?;
    println!("Removed '{key}'");
    Ok(())
}

pub async fn run_clear(coordinator: &StorageCoordinator, confirmed: bool) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ConfirmationRequired);
    }
    coordinator.clear().await?;
    println!("All data cleared");
    Ok(())
}

pub async fn run_dump(coordinator: &StorageCoordinator) -> Result<(), CliError> {
    let snapshot = coordinator.debug_snapshot().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
