//! autoreview core - queue-driven code review pipeline
//!
//! This crate holds the job model, the queue sources, the seams for prompt
//! storage, inference and comment publishing, and the worker loop that ties
//! them together. Concrete SQS, S3, Redis and GitHub clients live in their
//! own crates.

pub mod config;
pub mod error;
pub mod inference;
pub mod job;
pub mod prompt;
pub mod publish;
pub mod queue;
pub mod worker;

pub use config::{Config, QueueBackend};
pub use error::{Error, Result};
pub use inference::{CommandRunner, InferenceRunner};
pub use job::JobMessage;
pub use prompt::{PromptFetcher, PromptLocator};
pub use publish::{comment_body, compare_link, CommentSink, ResultPublisher};
pub use queue::{Delivery, QueueSource};
pub use worker::{Iteration, JobError, Stage, Worker, WorkerState, WorkerStats};
