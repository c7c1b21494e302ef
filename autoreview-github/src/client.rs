//! GitHub App client using octocrab

use std::path::Path;

use async_trait::async_trait;
use jsonwebtoken::EncodingKey;
use octocrab::models::{AppId, InstallationId};
use octocrab::Octocrab;
use tracing::{debug, info};

use crate::{Error, Result};

/// App-level identity used to mint installation tokens
#[derive(Clone)]
pub struct GitHubAppCredentials {
    app_id: u64,
    installation_id: u64,
    key: EncodingKey,
}

impl GitHubAppCredentials {
    /// Build credentials from PEM-encoded RSA key material
    pub fn from_pem(app_id: u64, installation_id: u64, pem: &[u8]) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(pem)
            .map_err(|e| Error::Key(format!("Invalid RSA private key: {}", e)))?;
        Ok(Self {
            app_id,
            installation_id,
            key,
        })
    }

    /// Build credentials from a PEM key file
    pub fn from_key_file(app_id: u64, installation_id: u64, path: &Path) -> Result<Self> {
        let pem = std::fs::read(path)
            .map_err(|e| Error::Key(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_pem(app_id, installation_id, &pem)
    }
}

impl std::fmt::Debug for GitHubAppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubAppCredentials")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .finish_non_exhaustive()
    }
}

/// GitHub client authenticated as an app installation
///
/// Every comment fetches a fresh short-lived installation token.
pub struct GitHubAppClient {
    app: Octocrab,
    installation_id: InstallationId,
}

impl GitHubAppClient {
    /// Create a client for the given app credentials
    ///
    /// `api_url` overrides the API root, for GitHub Enterprise.
    pub fn new(credentials: GitHubAppCredentials, api_url: Option<&str>) -> Result<Self> {
        let GitHubAppCredentials {
            app_id,
            installation_id,
            key,
        } = credentials;

        let mut builder = Octocrab::builder().app(AppId(app_id), key);
        if let Some(url) = api_url {
            builder = builder
                .base_uri(url)
                .map_err(|e| Error::Other(format!("Invalid GitHub API URL '{}': {}", url, e)))?;
        }

        let app = builder
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(app_id, installation_id, "Created GitHub App client");

        Ok(Self {
            app,
            installation_id: InstallationId(installation_id),
        })
    }

    async fn installation(&self) -> Result<Octocrab> {
        let (client, _token) = self
            .app
            .installation_and_token(self.installation_id)
            .await
            .map_err(|e| match e {
                octocrab::Error::GitHub { ref source, .. } => Error::Auth(format!(
                    "Failed to obtain token for installation {}: {}",
                    self.installation_id.0, source.message
                )),
                other => Error::Api(other),
            })?;
        debug!(installation_id = self.installation_id.0, "Obtained installation token");
        Ok(client)
    }

    /// Post a comment on the issue thread of a pull request
    ///
    /// Returns the id of the new comment.
    pub async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> Result<u64> {
        let target = format!("{}/{}#{}", owner, repo, pr_number);
        let client = self.installation().await?;

        let comment = client
            .issues(owner, repo)
            .create_comment(pr_number, body)
            .await
            .map_err(|e| {
                let known = match &e {
                    octocrab::Error::GitHub { source, .. } => classify(&source.message, &target),
                    _ => None,
                };
                known.unwrap_or(Error::Api(e))
            })?;

        info!(pr = %target, comment_id = comment.id.0, url = %comment.html_url, "Comment created");
        Ok(comment.id.0)
    }
}

#[async_trait]
impl autoreview_core::CommentSink for GitHubAppClient {
    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> autoreview_core::Result<()> {
        GitHubAppClient::create_comment(self, owner, repo, pr_number, body).await?;
        Ok(())
    }
}

impl std::fmt::Debug for GitHubAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubAppClient")
            .field("installation_id", &self.installation_id)
            .finish_non_exhaustive()
    }
}

/// Map a GitHub API error message to a specific error, if it is a known kind
fn classify(message: &str, target: &str) -> Option<Error> {
    let lower = message.to_ascii_lowercase();
    if lower.contains("not found") {
        Some(Error::PrNotFound(target.to_string()))
    } else if lower.contains("bad credentials") {
        Some(Error::Auth("Invalid or revoked GitHub App credentials".to_string()))
    } else if lower.contains("rate limit") {
        Some(Error::RateLimited(message.to_string()))
    } else {
        None
    }
}
