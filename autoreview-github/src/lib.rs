//! autoreview GitHub - review comment publishing
//!
//! Authenticates as a GitHub App installation and posts review comments to
//! pull request threads.

mod client;
mod error;

pub use client::{GitHubAppClient, GitHubAppCredentials};
pub use error::{Error, Result};
