//! Error types for the colloquy daemon.

use thiserror::Error;

use colloquy::EngineError;
use colloquy_common::protocol::{ClientResponse, ErrorKind};

/// Errors that can occur in the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// I/O error (file operations, socket communication).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required request argument was missing or empty.
    #[error("{0} is required")]
    RequiredArgument(&'static str),

    /// Conversation not found. Also covers malformed conversation ids,
    /// which are indistinguishable from unknown ones to the client.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// Reply or title engine failure.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Reply generation exceeded its deadline.
    #[error("reply generation timed out after {0} seconds")]
    ReplyTimeout(u64),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `DaemonError`.
pub type Result<T> = std::result::Result<T, DaemonError>;

impl From<anyhow::Error> for DaemonError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl DaemonError {
    /// Maps the error onto the closed set of wire error categories.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RequiredArgument(_) => ErrorKind::InvalidArgument,
            Self::ConversationNotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<DaemonError> for ClientResponse {
    fn from(err: DaemonError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
