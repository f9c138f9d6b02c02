use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Unknown authentication type: {0}")]
    UnknownAuthenticationType(String),
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Fetching {url} failed with status {status}")]
    Fetch { url: String, status: u16 },
    #[error("Store rejected {operation} with status {status}: {body}")]
    Store {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("Failed to write configuration output {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Environment error: {0}")]
    Environment(String),
}

/// Whether an error only affects the manifest being processed or the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Recoverable,
    Fatal,
}

impl SyncError {
    pub fn severity(&self) -> Severity {
        match self {
            SyncError::Output { .. } | SyncError::Environment(_) => Severity::Fatal,
            _ => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// `UnknownAuthenticationType` is a specialisation of `InvalidConfiguration`.
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfiguration(_) | SyncError::UnknownAuthenticationType(_)
        )
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SyncError::InvalidConfiguration(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingMessage {
    pub message: String,
    pub source: Option<String>,
}

impl ProcessingMessage {
    pub fn new(message: impl Into<String>, source: Option<String>) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }
}
