//! Remote storage configuration model

use serde::{Deserialize, Serialize};

use crate::util::normalize_text_option;

/// Remote sync settings, persisted locally under `storage_config`.
///
/// Never pushed to the remote document: the token is the credential used to
/// reach it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Whether gist sync is switched on
    #[serde(default)]
    pub enable_github: bool,
    /// Bearer credential for the gist API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Remote document id; `None` until the first document is created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gist_id: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StorageConfig")
            .field("enable_github", &self.enable_github)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("gist_id", &self.gist_id)
            .finish()
    }
}

impl StorageConfig {
    /// Enabled configuration for the given token and optional document id
    pub fn github(token: impl Into<String>, gist_id: Option<String>) -> Self {
        Self {
            enable_github: true,
            token: normalize_text_option(Some(token.into())),
            gist_id: normalize_text_option(gist_id),
        }
    }

    /// Disabled configuration
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Token to use when remote sync is enabled and a credential is present
    pub fn active_token(&self) -> Option<String> {
        if !self.enable_github {
            return None;
        }
        normalize_text_option(self.token.clone())
    }

    pub fn is_remote_enabled(&self) -> bool {
        self.active_token().is_some()
    }

    /// Copy with the token replaced by a placeholder, safe to print
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            enable_github: self.enable_github,
            token: self.token.as_ref().map(|_| "[REDACTED]".to_string()),
            gist_id: self.gist_id.clone(),
        }
    }
}
