//! Job messages as they arrive on the review queue

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One code review request
///
/// Producers emit PascalCase keys; camelCase spellings are accepted as
/// aliases. Every field is required and unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobMessage {
    /// CI run that produced the request
    #[serde(alias = "runNumber")]
    pub run_number: u64,
    /// Pull request to comment on
    #[serde(alias = "prNumber")]
    pub pr_number: u64,
    /// Repository owner
    #[serde(alias = "ownerName", alias = "owner")]
    pub owner_name: String,
    /// Repository name
    #[serde(alias = "repoName", alias = "repo")]
    pub repo_name: String,
    /// Base branch
    #[serde(alias = "baseRef")]
    pub base_ref: String,
    /// Head branch
    #[serde(alias = "headRef")]
    pub head_ref: String,
    /// Locator of the stored prompt, e.g. `s3://bucket/key.txt`
    #[serde(alias = "promptUrl", alias = "promptLocator")]
    pub prompt_url: String,
}

impl JobMessage {
    /// Parse a raw queue payload
    pub fn parse(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| Error::Parse(format!("invalid job message: {}", e)))
    }

    /// Serialize back to the canonical wire format
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for JobMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}#{} (run {})",
            self.owner_name, self.repo_name, self.pr_number, self.run_number
        )
    }
}
