//! Parse command - validate a job message payload

use std::io::Read;
use std::path::PathBuf;

use autoreview_core::{compare_link, JobMessage, PromptLocator};
use clap::Args;

/// Arguments for the parse command
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// JSON file to read, or "-" for stdin
    #[arg(default_value = "-")]
    pub path: PathBuf,
}

impl ParseArgs {
    /// Execute the parse command
    pub fn execute(&self) -> anyhow::Result<()> {
        let raw = if self.path.as_os_str() == "-" {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        } else {
            std::fs::read(&self.path)?
        };

        let job = JobMessage::parse(&raw)?;
        let locator = PromptLocator::parse(&job.prompt_url)?;

        println!("Job: {}", job);
        println!(
            "  compare: {}",
            compare_link(&job.owner_name, &job.repo_name, &job.base_ref, &job.head_ref)
        );
        println!("  bucket: {}", locator.bucket);
        println!("  key: {}", locator.key);

        Ok(())
    }
}
