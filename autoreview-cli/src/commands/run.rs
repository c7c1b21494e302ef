//! Run command - start the worker loop

use std::time::Duration;

use autoreview_core::Config;
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::components;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Sleep between empty polls, e.g. "1s" or "500ms" (overrides config)
    #[arg(long, value_parser = parse_duration)]
    pub idle_backoff: Option<Duration>,

    /// Handle a single poll cycle and exit
    #[arg(long)]
    pub once: bool,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut config = config.clone();
        if let Some(backoff) = self.idle_backoff {
            config.worker.idle_backoff = backoff;
        }

        let mut worker = components::worker(&config).await?;
        let cancel = CancellationToken::new();

        if self.once {
            let iteration = worker.run_once(&cancel).await;
            tracing::info!(outcome = ?iteration, "Single poll cycle finished");
            if let Some(failure) = iteration.failure() {
                anyhow::bail!("Single poll cycle failed: {}", failure);
            }
            return Ok(());
        }

        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested, stopping worker");
                shutdown.cancel();
            }
        });

        let stats = worker.run(cancel).await;
        println!(
            "Processed {} job(s), {} failed, {} poll error(s)",
            stats.completed, stats.failed, stats.poll_errors
        );

        Ok(())
    }
}
