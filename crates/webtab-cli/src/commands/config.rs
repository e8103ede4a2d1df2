use webtab_core::models::StorageConfig;
use webtab_core::util::normalize_text_option;
use webtab_core::StorageCoordinator;

use crate::error::CliError;

pub async fn run_config_show(coordinator: &StorageCoordinator) -> Result<(), CliError> {
    let config = coordinator.storage_config().await?;
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    println!(
        "Sync: {}",
        if coordinator.storage().is_remote_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );
    Ok(())
}

pub async fn run_config_enable(
    coordinator: &StorageCoordinator,
    token: &str,
    gist_id: Option<String>,
) -> Result<(), CliError> {
    let token = normalize_text_option(Some(token.to_string())).ok_or(CliError::MissingToken)?;
    let gist_id = match normalize_text_option(gist_id) {
        Some(id) => Some(id),
        None => coordinator.storage_config().await?.gist_id,
    };

    coordinator
        .set_storage_config(&StorageConfig::github(token, gist_id.clone()))
        .await?;

    match gist_id {
        Some(id) => println!("Gist sync enabled (gist {id})"),
        None => println!("Gist sync enabled; a private gist is created on the first push"),
    }
    Ok(())
}

pub async fn run_config_disable(coordinator: &StorageCoordinator) -> Result<(), CliError> {
    let mut config = coordinator.storage_config().await?;
    config.enable_github = false;
    coordinator.set_storage_config(&config).await?;
    println!("Gist sync disabled");
    Ok(())
}

pub async fn run_config_create_gist(
    coordinator: &StorageCoordinator,
    token: Option<String>,
) -> Result<(), CliError> {
    let stored = coordinator.storage_config().await?;
    let token = normalize_text_option(token)
        .or_else(|| stored.token.clone())
        .and_then(|token| normalize_text_option(Some(token)))
        .ok_or(CliError::MissingToken)?;

    let gist_id = coordinator.create_placeholder_document(&token).await?;
    coordinator
        .set_storage_config(&StorageConfig::github(token, Some(gist_id.clone())))
        .await?;
    println!("{gist_id}");
    Ok(())
}
