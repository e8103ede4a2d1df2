//! Error types for webtab-core

use thiserror::Error;

/// Result type alias using webtab-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in webtab-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local store failure that is not a libSQL error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record or key not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote sync requested while disabled or missing a credential
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network failure, non-2xx response, or undecodable remote payload
    #[error("Remote error: {0}")]
    Remote(String),
}

impl Error {
    /// Whether this error originated from the remote document service.
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::Remote(error.to_string())
    }
}
