//! WebTab CLI - shortcuts, to-dos and gist sync from the terminal

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use webtab_core::models::ShortcutPatch;
use webtab_core::util::normalize_text_option;

use crate::cli::{
    Cli, Commands, ConfigCommands, LogCommands, ShortcutCommands, SyncCommands, TodoCommands,
};
use crate::commands::common::{flush_pending, open_coordinator, resolve_db_path};
use crate::commands::{config, kv, log, shortcut, sync, todo};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("webtab=info")),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path)?;
    let coordinator = open_coordinator(&db_path).await?;

    let result = match cli.command {
        Commands::Get { key } => kv::run_get(&coordinator, &key).await,
        Commands::Set { key, value } => kv::run_set(&coordinator, &key, &value).await,
        Commands::Remove { key } => kv::run_remove(&coordinator, &key).await,
        Commands::Clear { yes } => kv::run_clear(&coordinator, yes).await,
        Commands::Dump => kv::run_dump(&coordinator).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => config::run_config_show(&coordinator).await,
            ConfigCommands::Enable { token, gist_id } => {
                config::run_config_enable(&coordinator, &token, gist_id).await
            }
            ConfigCommands::Disable => config::run_config_disable(&coordinator).await,
            ConfigCommands::CreateGist { token } => {
                config::run_config_create_gist(&coordinator, token).await
            }
        },
        Commands::Shortcut { command } => run_shortcut(&coordinator, command).await,
        Commands::Todo { command } => match command {
            TodoCommands::List { all, json } => todo::run_list(&coordinator, all, json).await,
            TodoCommands::Add { text } => todo::run_add(&coordinator, &text).await,
            TodoCommands::Toggle { id } => todo::run_toggle(&coordinator, &id).await,
            TodoCommands::Edit { id, text } => todo::run_edit(&coordinator, &id, &text).await,
            TodoCommands::Delete { id } => todo::run_delete(&coordinator, &id).await,
        },
        Commands::Log { command } => match command {
            LogCommands::List { limit, json } => log::run_log_list(&coordinator, limit, json).await,
            LogCommands::Clear => log::run_log_clear(&coordinator).await,
        },
        Commands::Sync { command } => match command {
            SyncCommands::Pull { json } => sync::run_pull(&coordinator, json).await,
            SyncCommands::Push => sync::run_push(&coordinator).await,
        },
    };

    // Local writes already landed; push what they queued before exiting.
    flush_pending(&coordinator).await;
    result
}

async fn run_shortcut(
    coordinator: &webtab_core::StorageCoordinator,
    command: ShortcutCommands,
) -> Result<(), CliError> {
    match command {
        ShortcutCommands::List { all, json } => shortcut::run_list(coordinator, all, json).await,
        ShortcutCommands::Add { name, url, icon } => {
            shortcut::run_add(coordinator, &name, &url, icon).await
        }
        ShortcutCommands::Edit {
            id,
            name,
            url,
            icon,
        } => {
            let patch = ShortcutPatch {
                name: normalize_text_option(name),
                url: normalize_text_option(url),
                icon: normalize_text_option(icon),
            };
            shortcut::run_edit(coordinator, &id, patch).await
        }
        ShortcutCommands::Delete { id } => shortcut::run_delete(coordinator, &id).await,
        ShortcutCommands::Group { ids, name } => shortcut::run_group(coordinator, &ids, name).await,
        ShortcutCommands::RenameGroup { id, name } => {
            shortcut::run_rename_group(coordinator, &id, &name).await
        }
        ShortcutCommands::AddToGroup {
            group_id,
            shortcut_id,
        } => shortcut::run_add_to_group(coordinator, &group_id, &shortcut_id).await,
        ShortcutCommands::UngroupItem { group_id, item_id } => {
            shortcut::run_ungroup_item(coordinator, &group_id, &item_id).await
        }
        ShortcutCommands::DeleteGroup { id } => shortcut::run_delete_group(coordinator, &id).await,
    }
}
