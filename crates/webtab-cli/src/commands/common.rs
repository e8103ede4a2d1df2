use std::env;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use webtab_core::models::{ClientInfo, OperationLogEntry, RecordId, ShortcutEntry, Todo};
use webtab_core::services::IpLookup;
use webtab_core::storage::{LocalStore, DEFAULT_GIST_API_URL};
use webtab_core::sync::SyncReport;
use webtab_core::util::{compact_text, normalize_text_option};
use webtab_core::{HttpGistTransport, OperationLogger, StorageCoordinator};

use crate::error::CliError;

pub const ENV_DB_PATH: &str = "WEBTAB_DB_PATH";
pub const ENV_GIST_API_URL: &str = "WEBTAB_GIST_API_URL";
/// Set to `1`/`true` to look up the public IP for operation log entries
pub const ENV_RECORD_IP: &str = "WEBTAB_RECORD_IP";

const CLIENT_NAME: &str = "webtab-cli";

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(ENV_DB_PATH).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path().ok_or(CliError::NoDataDir)
}

pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("webtab").join("webtab.db"))
}

pub fn resolve_gist_api_url(env_value: Option<String>) -> String {
    normalize_text_option(env_value).unwrap_or_else(|| DEFAULT_GIST_API_URL.to_string())
}

pub async fn open_coordinator(db_path: &Path) -> Result<StorageCoordinator, CliError> {
    let local = LocalStore::open_or_volatile(db_path).await;
    let api_url = resolve_gist_api_url(env::var(ENV_GIST_API_URL).ok());
    let coordinator = StorageCoordinator::github(local, api_url);
    coordinator.init().await?;
    Ok(coordinator)
}

/// Push anything still queued; the process is about to exit
pub async fn flush_pending(coordinator: &StorageCoordinator) {
    let report = coordinator.sync_to_remote().await;
    if report.failed > 0 {
        eprintln!(
            "Warning: {} change(s) could not be pushed to the gist",
            report.failed
        );
    }
}

pub fn operation_logger(
    coordinator: &StorageCoordinator,
) -> OperationLogger<'_, HttpGistTransport> {
    let logger = OperationLogger::new(
        coordinator,
        ClientInfo::for_application(CLIENT_NAME, env!("CARGO_PKG_VERSION")),
    );
    if is_truthy(env::var(ENV_RECORD_IP).ok().as_deref()) {
        logger.with_ip_lookup(IpLookup::public())
    } else {
        logger
    }
}

pub fn is_truthy(value: Option<&str>) -> bool {
    value.is_some_and(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

pub fn normalize_key(key: &str) -> Result<String, CliError> {
    normalize_text_option(Some(key.to_string())).ok_or(CliError::EmptyKey)
}

pub fn parse_record_id(id: &str) -> Result<RecordId, CliError> {
    if id.trim().is_empty() {
        return Err(CliError::EmptyId);
    }
    let Ok(id) = id.parse::<RecordId>();
    Ok(id)
}

/// JSON when it parses, otherwise the raw text as a string
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn join_text(parts: &[String]) -> Result<String, CliError> {
    normalize_text_option(Some(parts.join(" "))).ok_or(CliError::EmptyText)
}

pub fn format_shortcut_lines(entries: &[ShortcutEntry]) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in entries {
        match entry {
            ShortcutEntry::Link(link) => {
                lines.push(format!(
                    "{}  {}  {}{}",
                    link.id,
                    link.name,
                    link.url,
                    deleted_marker(link.meta.deleted)
                ));
            }
            ShortcutEntry::Group(group) => {
                lines.push(format!(
                    "{}  [{}] ({} items){}",
                    group.id,
                    group.name.as_deref().unwrap_or("Group"),
                    group.items.len(),
                    deleted_marker(group.meta.deleted)
                ));
                for item in &group.items {
                    lines.push(format!(
                        "    {}  {}  {}{}",
                        item.id,
                        item.name,
                        item.url,
                        deleted_marker(item.meta.deleted)
                    ));
                }
            }
        }
    }
    lines
}

pub fn format_todo_lines(todos: &[Todo]) -> Vec<String> {
    todos
        .iter()
        .map(|todo| {
            format!(
                "{} {}  {}{}",
                if todo.completed { "[x]" } else { "[ ]" },
                todo.id,
                todo.text,
                deleted_marker(todo.meta.deleted)
            )
        })
        .collect()
}

const fn deleted_marker(deleted: bool) -> &'static str {
    if deleted {
        "  (deleted)"
    } else {
        ""
    }
}

#[derive(Debug, Serialize)]
pub struct LogListItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub timestamp: i64,
    pub timestamp_iso: String,
    pub client: String,
    pub ip: String,
}

pub fn log_to_list_item(entry: &OperationLogEntry) -> LogListItem {
    LogListItem {
        id: entry.id.clone(),
        kind: entry.kind.to_string(),
        content: entry.content.clone(),
        timestamp: entry.timestamp,
        timestamp_iso: format_timestamp(entry.timestamp),
        client: format!("{} ({})", entry.client.browser, entry.client.platform),
        ip: entry.ip.clone(),
    }
}

pub fn format_log_lines(entries: &[OperationLogEntry], now_ms: i64) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "{:>8}  {:<18} {}",
                format_relative_time(entry.timestamp, now_ms),
                entry.kind.as_str(),
                compact_text(&entry.content)
            )
        })
        .collect()
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    [
        ("shortcuts", report.shortcuts),
        ("todos", report.todos),
        ("operation_logs", report.operation_logs),
    ]
    .into_iter()
    .map(|(label, counts)| {
        format!(
            "{label}: local {}, remote {}, merged {}",
            counts.local, counts.remote, counts.merged
        )
    })
    .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map_or_else(|| timestamp_ms.to_string(), |value| value.to_rfc3339())
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
