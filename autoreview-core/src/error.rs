//! Error types for autoreview

use thiserror::Error;

/// Result type alias for autoreview operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for autoreview operations
///
/// Integration crates map their native SDK errors into one of these kinds so
/// the worker loop can treat every stage uniformly.
#[derive(Error, Debug)]
pub enum Error {
    /// Network or authentication failure talking to the queue, storage or comment API
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed job message body or prompt locator
    #[error("Parse error: {0}")]
    Parse(String),

    /// Object or pull request missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// External inference command failed or produced no usable output
    #[error("Process error: {0}")]
    Process(String),

    /// Unresolvable credentials or configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation interrupted by shutdown
    #[error("Cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Short machine-friendly name of the error kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transport(_) => "transport",
            Error::Parse(_) => "parse",
            Error::NotFound(_) => "not_found",
            Error::Process(_) => "process",
            Error::Config(_) => "config",
            Error::Cancelled => "cancelled",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }
}
