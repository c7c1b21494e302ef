//! Formatting and posting review comments

use async_trait::async_trait;
use tracing::info;

use crate::Result;

/// Markdown link to the branch comparison, relative to the forge root
pub fn compare_link(owner: &str, repo: &str, base_ref: &str, head_ref: &str) -> String {
    format!(
        "[{base}...{head}](/{owner}/{repo}/compare/{base}...{head})",
        base = base_ref,
        head = head_ref,
        owner = owner,
        repo = repo,
    )
}

/// Full comment body for a generated review
pub fn comment_body(
    owner: &str,
    repo: &str,
    base_ref: &str,
    head_ref: &str,
    review: &str,
) -> String {
    format!(
        "This is an auto-generated code review for {}\n\n{}",
        compare_link(owner, repo, base_ref, head_ref),
        review
    )
}

/// Trait for authenticated writers of pull request comments
#[async_trait]
pub trait CommentSink: Send + Sync {
    /// Post `body` to the issue thread of pull request `pr_number` in `owner/repo`
    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> Result<()>;
}

/// Builds the review comment and hands it to a [`CommentSink`]
pub struct ResultPublisher {
    sink: Box<dyn CommentSink>,
}

impl ResultPublisher {
    pub fn new(sink: Box<dyn CommentSink>) -> Self {
        Self { sink }
    }

    /// Publish a review to `owner/repo#pr_number`
    pub async fn publish(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        review_text: &str,
        base_ref: &str,
        head_ref: &str,
    ) -> Result<()> {
        let body = comment_body(owner, repo, base_ref, head_ref, review_text);
        self.sink.create_comment(owner, repo, pr_number, &body).await?;
        info!(owner, repo, pr = pr_number, "Review comment posted");
        Ok(())
    }
}

impl std::fmt::Debug for ResultPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultPublisher").finish_non_exhaustive()
    }
}
