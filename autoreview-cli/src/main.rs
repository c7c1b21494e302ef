//! autoreview CLI - queue-driven code review worker
//!
//! Pulls review jobs off a queue, runs the prompt through a local model and
//! posts the result to the pull request.

mod commands;
mod components;

use std::path::PathBuf;

use autoreview_core::{Config, QueueBackend};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ParseArgs, ReviewArgs, RunArgs};

/// autoreview: automated pull request reviews from a job queue
#[derive(Parser, Debug)]
#[command(name = "autoreview")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/autoreview/config.toml)
    #[arg(short, long, global = true, env = "AUTOREVIEW_CONFIG")]
    config: Option<PathBuf>,

    /// Queue backend (overrides config and env)
    #[arg(long, global = true, value_parser = parse_backend)]
    backend: Option<QueueBackend>,

    /// Model passed to the inference command (overrides config and env)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Start the worker loop
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Generate a review for a stored prompt and print it
    Review(ReviewArgs),

    /// Validate a job message payload
    Parse(ParseArgs),

    /// Show current configuration
    Config,
}

fn parse_backend(s: &str) -> Result<QueueBackend, String> {
    s.parse().map_err(|e: autoreview_core::Error| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config =
        Config::load_with_overrides(cli.config.as_deref(), cli.backend, cli.model.clone())?;

    if cli.verbose {
        tracing::info!(
            backend = %config.queue.backend,
            program = %config.inference.program,
            args = ?config.inference.args,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("autoreview {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Run(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Review(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Parse(args)) => {
            args.execute()?;
        }
        Some(Commands::Config) => {
            print_config(&config, cli.config.as_deref());
        }
        None => {
            println!("autoreview - automated pull request reviews from a job queue");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn print_config(config: &Config, explicit: Option<&std::path::Path>) {
    let or_unset = |v: Option<&str>| v.unwrap_or("(unset)").to_string();

    println!("autoreview Configuration");
    println!("========================");
    println!();
    println!("Queue:");
    println!("  backend: {}", config.queue.backend);
    match config.queue.backend {
        QueueBackend::Sqs => {
            println!("  queue_url: {}", or_unset(config.queue.sqs.queue_url.as_deref()));
            println!("  visibility_timeout: {:?}", config.queue.sqs.visibility_timeout);
            println!("  max_receive_count: {}", config.queue.sqs.max_receive_count);
            println!(
                "  dead_letter_queue_url: {}",
                or_unset(config.queue.sqs.dead_letter_queue_url.as_deref())
            );
        }
        QueueBackend::Redis => {
            println!("  address: {}", or_unset(config.queue.redis.address.as_deref()));
            println!(
                "  password: {}",
                if config.queue.redis.password.is_some() { "(set)" } else { "(unset)" }
            );
            println!("  list_key: {}", config.queue.redis.list_key);
        }
    }
    println!();
    println!("Storage:");
    println!("  endpoint: {}", config.storage.endpoint.as_deref().unwrap_or("(default)"));
    println!();
    println!("GitHub:");
    println!(
        "  app_id: {}",
        config.github.app_id.map_or("(unset)".to_string(), |id| id.to_string())
    );
    println!(
        "  installation_id: {}",
        config.github.installation_id.map_or("(unset)".to_string(), |id| id.to_string())
    );
    println!(
        "  private_key_path: {}",
        config
            .github
            .private_key_path
            .as_ref()
            .map_or("(unset)".to_string(), |p| p.display().to_string())
    );
    println!();
    println!("Inference:");
    println!("  command: {} {}", config.inference.program, config.inference.args.join(" "));
    println!("  timeout: {:?}", config.inference.timeout);
    println!();
    println!("Worker:");
    println!("  idle_backoff: {:?}", config.worker.idle_backoff);
    println!();

    let path = explicit.map(|p| p.to_path_buf()).or_else(Config::default_config_path);
    if let Some(path) = path {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
}
