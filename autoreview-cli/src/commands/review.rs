//! Review command - run inference on a stored prompt without the queue

use anyhow::Context;
use autoreview_core::{Config, PromptLocator};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::components;

/// Arguments for the review command
#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Prompt locator, e.g. s3://bucket/key.txt
    #[arg(required = true)]
    pub prompt_url: String,

    /// Show what would be executed without running inference
    #[arg(long)]
    pub dry_run: bool,
}

impl ReviewArgs {
    /// Execute the review command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let locator = PromptLocator::parse(&self.prompt_url)?;

        if self.dry_run {
            println!("[Dry run] Would fetch s3://{}", locator);
            println!(
                "[Dry run] Would run: {} {} <prompt>",
                config.inference.program,
                config.inference.args.join(" ")
            );
            return Ok(());
        }

        let fetcher = components::fetcher(config).await;
        let prompt = fetcher.fetch(&locator).await?;
        let prompt = String::from_utf8(prompt)
            .with_context(|| format!("Prompt at s3://{} is not valid UTF-8", locator))?;
        tracing::debug!(bytes = prompt.len(), "Prompt fetched");

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        });

        let review = components::inference(config).run(&prompt, &cancel).await?;
        println!("{}", review.trim_end());

        Ok(())
    }
}
