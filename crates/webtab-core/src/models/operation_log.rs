//! Operation log entry model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Maximum number of log entries kept locally and after a merge
pub const MAX_LOG_ENTRIES: usize = 1000;

/// Placeholder used when client or network details cannot be determined
pub const UNKNOWN: &str = "unknown";

/// Kind of user action recorded in the log
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    AddShortcut,
    EditShortcut,
    DeleteShortcut,
    CreateGroup,
    EditGroupName,
    DeleteGroup,
    AddToGroup,
    RemoveFromGroup,
    AddTodo,
    ToggleTodo,
    DeleteTodo,
    /// Kind written by a newer client; preserved verbatim
    Other(String),
}

impl OperationKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AddShortcut => "add_shortcut",
            Self::EditShortcut => "edit_shortcut",
            Self::DeleteShortcut => "delete_shortcut",
            Self::CreateGroup => "create_group",
            Self::EditGroupName => "edit_group_name",
            Self::DeleteGroup => "delete_group",
            Self::AddToGroup => "add_to_group",
            Self::RemoveFromGroup => "remove_from_group",
            Self::AddTodo => "add_todo",
            Self::ToggleTodo => "toggle_todo",
            Self::DeleteTodo => "delete_todo",
            Self::Other(kind) => kind,
        }
    }
}

impl From<String> for OperationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "add_shortcut" => Self::AddShortcut,
            "edit_shortcut" => Self::EditShortcut,
            "delete_shortcut" => Self::DeleteShortcut,
            "create_group" => Self::CreateGroup,
            "edit_group_name" => Self::EditGroupName,
            "delete_group" => Self::DeleteGroup,
            "add_to_group" => Self::AddToGroup,
            "remove_from_group" => Self::RemoveFromGroup,
            "add_todo" => Self::AddTodo,
            "toggle_todo" => Self::ToggleTodo,
            "delete_todo" => Self::DeleteTodo,
            _ => Self::Other(value),
        }
    }
}

impl From<OperationKind> for String {
    fn from(value: OperationKind) -> Self {
        match value {
            OperationKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// Description of the client that performed an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    #[serde(default = "unknown")]
    pub browser: String,
    #[serde(default = "unknown")]
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Other client details (screen resolution and the like), kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            browser: unknown(),
            platform: unknown(),
            user_agent: None,
            language: None,
            timezone: None,
            extra: Map::new(),
        }
    }
}

impl ClientInfo {
    /// Describe this process as the client `name`/`version`
    pub fn for_application(name: &str, version: &str) -> Self {
        let platform = format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH);
        let language = std::env::var("LANG")
            .ok()
            .and_then(|lang| lang.split('.').next().map(str::to_string))
            .filter(|lang| !lang.is_empty() && lang != "C" && lang != "POSIX")
            .map(|lang| lang.replace('_', "-"));

        Self {
            browser: name.to_string(),
            user_agent: Some(format!("{name}/{version} ({platform})")),
            platform,
            language,
            timezone: Some(chrono::Local::now().offset().to_string()),
            extra: Map::new(),
        }
    }
}

/// One append-only log entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    /// `<millis>-<random>` identifier
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    /// Human-readable or JSON-encoded description
    pub content: String,
    /// Creation time (Unix ms)
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub client: ClientInfo,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
    #[serde(default = "unknown")]
    pub ip: String,
    /// Fields written by other clients, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
