//! Crate-level error types.

use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the feedback/scoring/chat/persistence backend.
///
/// Every variant is terminal for the single request that produced it; callers
/// render a fallback and let the user re-trigger the action.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced a response (connect, timeout, body read).
    #[error("request to {url} failed: {detail}")]
    Transport { url: String, detail: String },

    /// The server replied with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The response parsed but an expected key was absent or mistyped.
    #[error("malformed response: field '{field}': {detail}")]
    Malformed { field: String, detail: String },
}

impl BackendError {
    pub fn malformed(field: impl Into<String>, detail: impl Into<String>) -> Self {
        BackendError::Malformed {
            field: field.into(),
            detail: detail.into(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error for workspace operations and the CLI.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("unknown question '{0}'")]
    UnknownQuestion(String),

    #[error("question '{0}' is already registered")]
    DuplicateQuestion(String),

    #[error("no feedback item {index} on panel for question '{question}'")]
    UnknownItem { question: String, index: usize },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
