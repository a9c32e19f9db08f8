use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::storage::backend::BackendError;

#[derive(Error, Debug)]
pub enum KeyServerError {
    #[error("Certificate not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Backend unavailable")]
    Unavailable,

    #[error("Timed out")]
    TimedOut,

    #[error("Certificate parsing error: {0}")]
    Parse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, KeyServerError>;

/// Error category as it travels over the RPC boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidRequest,
    Unavailable,
    TimedOut,
    Parse,
    Transport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::TimedOut => "timed_out",
            ErrorKind::Parse => "parse",
            ErrorKind::Transport => "transport",
        };
        f.write_str(name)
    }
}

impl KeyServerError {
    /// Category used when reporting this error to a remote caller.
    ///
    /// Local-only failures (configuration, files, encoding) are reported as
    /// transport problems since the caller cannot act on them.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeyServerError::NotFound(_) => ErrorKind::NotFound,
            KeyServerError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            KeyServerError::Unavailable => ErrorKind::Unavailable,
            KeyServerError::TimedOut => ErrorKind::TimedOut,
            KeyServerError::Parse(_) => ErrorKind::Parse,
            KeyServerError::Transport(_)
            | KeyServerError::Config(_)
            | KeyServerError::Io(_)
            | KeyServerError::Json(_)
            | KeyServerError::Yaml(_) => ErrorKind::Transport,
        }
    }

    /// Rebuild an error received from a remote peer.
    pub fn from_remote(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::NotFound => KeyServerError::NotFound(message),
            ErrorKind::InvalidRequest => KeyServerError::InvalidRequest(message),
            ErrorKind::Unavailable => KeyServerError::Unavailable,
            ErrorKind::TimedOut => KeyServerError::TimedOut,
            ErrorKind::Parse => KeyServerError::Parse(message),
            ErrorKind::Transport => KeyServerError::Transport(message),
        }
    }
}

impl From<BackendError> for KeyServerError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound => KeyServerError::NotFound("no such row or column".to_string()),
            BackendError::InvalidRequest(why) => KeyServerError::InvalidRequest(why),
            BackendError::Unavailable => KeyServerError::Unavailable,
            BackendError::TimedOut => KeyServerError::TimedOut,
            BackendError::Transport(msg) => KeyServerError::Transport(msg),
        }
    }
}

impl From<reqwest::Error> for KeyServerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            KeyServerError::TimedOut
        } else {
            KeyServerError::Transport(err.to_string())
        }
    }
}
