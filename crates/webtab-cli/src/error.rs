use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] webtab_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Key cannot be empty")]
    EmptyKey,
    #[error("Id cannot be empty")]
    EmptyId,
    #[error("To-do text cannot be empty")]
    EmptyText,
    #[error("Nothing to change; pass --name, --url or --icon")]
    EmptyPatch,
    #[error("Refusing to clear all data without --yes")]
    ConfirmationRequired,
    #[error("No GitHub token configured. Run `webtab config enable --token <TOKEN>` first.")]
    MissingToken,
    #[error("Could not resolve a data directory; pass --db-path or set WEBTAB_DB_PATH")]
    NoDataDir,
}
