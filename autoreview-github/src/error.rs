//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Private key could not be read or parsed
    #[error("GitHub App key error: {0}")]
    Key(String),

    /// Pull request or repository not found
    #[error("Pull request {0} not found")]
    PrNotFound(String),

    /// Rate limit exceeded
    #[error("GitHub rate limit exceeded: {0}")]
    RateLimited(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<Error> for autoreview_core::Error {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::Key(_) => autoreview_core::Error::Config(message),
            Error::PrNotFound(_) => autoreview_core::Error::NotFound(message),
            Error::Api(_) | Error::Auth(_) | Error::RateLimited(_) | Error::Other(_) => {
                autoreview_core::Error::Transport(message)
            }
        }
    }
}
