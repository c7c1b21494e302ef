//! Prompt locators and the fetcher seam

use std::fmt;

use async_trait::async_trait;
use url::Url;

use crate::{Error, Result};

/// Where a prompt lives: a container (bucket) and an object key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptLocator {
    pub bucket: String,
    pub key: String,
}

impl PromptLocator {
    /// Parse a locator URI such as `s3://bucket/path/to/key.txt`
    ///
    /// The authority names the bucket and the path, minus its leading `/`,
    /// names the key. The key is percent-decoded but otherwise taken as
    /// written: `.` and `..` segments are part of the key.
    pub fn parse(locator: &str) -> Result<Self> {
        let url = Url::parse(locator)
            .map_err(|e| Error::Parse(format!("Invalid prompt locator '{}': {}", locator, e)))?;

        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Parse(format!("Prompt locator '{}' has no bucket", locator)))?
            .to_string();

        let raw = raw_path(locator);
        let raw_key = raw.strip_prefix('/').unwrap_or(raw);
        let key = urlencoding::decode(raw_key)
            .map_err(|e| {
                Error::Parse(format!("Invalid key in prompt locator '{}': {}", locator, e))
            })?
            .into_owned();

        if key.is_empty() {
            return Err(Error::Parse(format!(
                "Prompt locator '{}' has no object key",
                locator
            )));
        }

        Ok(Self { bucket, key })
    }
}

/// The path of `locator` exactly as written, without query or fragment
///
/// `Url::path` resolves dot segments, which would change the key.
fn raw_path(locator: &str) -> &str {
    let rest = locator.split_once("://").map_or("", |(_, rest)| rest);
    let after_authority = &rest[rest.find(['/', '?', '#']).unwrap_or(rest.len())..];
    let end = after_authority.find(['?', '#']).unwrap_or(after_authority.len());
    &after_authority[..end]
}

impl fmt::Display for PromptLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Trait for content stores that hold prompts
#[async_trait]
pub trait PromptFetcher: Send + Sync {
    /// Return the full object content, verbatim
    async fn fetch(&self, locator: &PromptLocator) -> Result<Vec<u8>>;
}
