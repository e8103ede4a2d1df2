use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "webtab")]
#[command(about = "Offline-first new-tab storage with optional GitHub gist sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the value stored under a key
    Get {
        key: String,
    },
    /// Store a value; valid JSON is stored as JSON, anything else as a string
    Set {
        key: String,
        value: String,
    },
    /// Remove a key
    #[command(alias = "rm")]
    Remove {
        key: String,
    },
    /// Delete all local data and empty the remote gist
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Print a diagnostic snapshot of the store as JSON
    Dump,
    /// Manage GitHub gist sync settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Manage shortcuts and shortcut groups
    #[command(alias = "sc")]
    Shortcut {
        #[command(subcommand)]
        command: ShortcutCommands,
    },
    /// Manage to-do items
    Todo {
        #[command(subcommand)]
        command: TodoCommands,
    },
    /// Inspect the operation log
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// Synchronize with the GitHub gist
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current settings (token redacted)
    Show,
    /// Enable gist sync
    Enable {
        /// GitHub token with the `gist` scope
        #[arg(long)]
        token: String,
        /// Existing gist to sync with; a new one is created on first push otherwise
        #[arg(long)]
        gist_id: Option<String>,
    },
    /// Disable gist sync (keeps the token)
    Disable,
    /// Create an empty private gist and start syncing with it
    CreateGist {
        /// Token to use instead of the stored one
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ShortcutCommands {
    /// List shortcuts
    List {
        /// Include deleted entries
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a shortcut
    Add {
        name: String,
        url: String,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Edit a shortcut
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Delete a shortcut
    Delete {
        id: String,
    },
    /// Group two or more shortcuts
    Group {
        /// Shortcut ids
        #[arg(required = true, num_args = 2..)]
        ids: Vec<String>,
        /// Group name
        #[arg(long)]
        name: Option<String>,
    },
    /// Rename a group
    RenameGroup {
        id: String,
        name: String,
    },
    /// Move a shortcut into a group
    AddToGroup {
        group_id: String,
        shortcut_id: String,
    },
    /// Move a shortcut out of a group
    UngroupItem {
        group_id: String,
        item_id: String,
    },
    /// Delete a group and its items
    DeleteGroup {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum TodoCommands {
    /// List to-do items
    List {
        /// Include deleted items
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a to-do item
    Add {
        text: Vec<String>,
    },
    /// Toggle completion
    Toggle {
        id: String,
    },
    /// Replace the text of an item
    Edit {
        id: String,
        text: Vec<String>,
    },
    /// Delete an item
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum LogCommands {
    /// Show recent operations
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every log entry
    Clear,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Merge the gist into local data
    Pull {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push pending local changes now
    Push,
}
