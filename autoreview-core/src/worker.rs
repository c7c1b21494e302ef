//! The worker loop: poll, fetch, infer, publish
//!
//! One job is in flight at a time. Any stage failure aborts that job only; the
//! loop goes back to idle and keeps polling until cancelled.

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::inference::InferenceRunner;
use crate::prompt::{PromptFetcher, PromptLocator};
use crate::publish::ResultPublisher;
use crate::queue::{Delivery, QueueSource};
use crate::{Error, JobMessage};

/// Loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// No job in flight
    #[default]
    Idle,
    /// One job in flight
    Processing,
}

/// Pipeline stage a job failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Inference,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "fetch"),
            Stage::Inference => write!(f, "inference"),
            Stage::Publish => write!(f, "publish"),
        }
    }
}

/// A job that could not be completed
#[derive(Debug)]
pub struct JobError {
    pub stage: Stage,
    pub source: Error,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.source)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Outcome of a single poll cycle
#[derive(Debug)]
pub enum Iteration {
    /// Queue had nothing
    Empty,
    /// Queue could not be polled
    PollFailed(Error),
    /// Job processed and published
    Completed(Delivery),
    /// Job aborted in one of its stages
    Failed(Delivery, JobError),
    /// Shutdown requested
    Cancelled,
}

impl Iteration {
    /// Whether the loop should back off before polling again
    pub fn should_back_off(&self) -> bool {
        matches!(self, Iteration::Empty | Iteration::PollFailed(_))
    }

    /// Describe the error the cycle ended in, if any
    pub fn failure(&self) -> Option<String> {
        match self {
            Iteration::PollFailed(e) => Some(format!("queue poll failed: {}", e)),
            Iteration::Failed(delivery, e) => Some(format!("job {} {}", delivery.job, e)),
            Iteration::Empty | Iteration::Completed(_) | Iteration::Cancelled => None,
        }
    }
}

/// Counters accumulated over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: u64,
    pub failed: u64,
    pub empty_polls: u64,
    pub poll_errors: u64,
}

impl WorkerStats {
    fn record(&mut self, iteration: &Iteration) {
        match iteration {
            Iteration::Empty => self.empty_polls += 1,
            Iteration::PollFailed(_) => self.poll_errors += 1,
            Iteration::Completed(_) => self.completed += 1,
            Iteration::Failed(..) => self.failed += 1,
            Iteration::Cancelled => {}
        }
    }
}

/// Single-consumer review pipeline
pub struct Worker {
    queue: Box<dyn QueueSource>,
    fetcher: Box<dyn PromptFetcher>,
    inference: Box<dyn InferenceRunner>,
    publisher: ResultPublisher,
    idle_backoff: Duration,
    state: WorkerState,
}

impl Worker {
    /// Create a worker with the default one second idle backoff
    pub fn new(
        queue: Box<dyn QueueSource>,
        fetcher: Box<dyn PromptFetcher>,
        inference: Box<dyn InferenceRunner>,
        publisher: ResultPublisher,
    ) -> Self {
        Self {
            queue,
            fetcher,
            inference,
            publisher,
            idle_backoff: Duration::from_secs(1),
            state: WorkerState::Idle,
        }
    }

    /// Set the sleep between empty or failed polls
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    /// Current loop state
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Poll and process until `cancel` fires
    pub async fn run(&mut self, cancel: CancellationToken) -> WorkerStats {
        let mut stats = WorkerStats::default();

        info!(
            queue = self.queue.name(),
            inference = self.inference.name(),
            idle_backoff = ?self.idle_backoff,
            "Worker started"
        );

        while !cancel.is_cancelled() {
            let iteration = self.run_once(&cancel).await;
            stats.record(&iteration);

            if matches!(iteration, Iteration::Cancelled) {
                break;
            }

            if iteration.should_back_off() {
                tokio::select! {
                    _ = tokio::time::sleep(self.idle_backoff) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }

        info!(
            completed = stats.completed,
            failed = stats.failed,
            poll_errors = stats.poll_errors,
            "Worker stopped"
        );
        stats
    }

    /// One poll cycle, processing the job if there is one
    pub async fn run_once(&mut self, cancel: &CancellationToken) -> Iteration {
        let delivery = match self.queue.poll(cancel).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                debug!("Queue empty");
                return Iteration::Empty;
            }
            Err(Error::Cancelled) => return Iteration::Cancelled,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Queue poll failed");
                return Iteration::PollFailed(e);
            }
        };

        self.state = WorkerState::Processing;
        info!(job = %delivery.job, source = %delivery.source_id, "Processing job");

        let result = self.process(&delivery.job, cancel).await;
        self.state = WorkerState::Idle;

        match result {
            Ok(()) => {
                info!(job = %delivery.job, "Job complete");
                Iteration::Completed(delivery)
            }
            Err(e) if matches!(e.source, Error::Cancelled) => {
                warn!(job = %delivery.job, stage = %e.stage, "Job interrupted by shutdown");
                Iteration::Cancelled
            }
            Err(e) => {
                error!(
                    job = %delivery.job,
                    stage = %e.stage,
                    kind = e.source.kind(),
                    error = %e.source,
                    "Job failed"
                );
                Iteration::Failed(delivery, e)
            }
        }
    }

    /// Run one job through fetch, inference and publish
    pub async fn process(
        &self,
        job: &JobMessage,
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        let review = self.generate(&job.prompt_url, cancel).await?;

        self.publisher
            .publish(
                &job.owner_name,
                &job.repo_name,
                job.pr_number,
                &review,
                &job.base_ref,
                &job.head_ref,
            )
            .await
            .map_err(|source| JobError {
                stage: Stage::Publish,
                source,
            })
    }

    /// Fetch the prompt at `prompt_url` and run inference on it
    pub async fn generate(
        &self,
        prompt_url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, JobError> {
        let fetch_failed = |source| JobError {
            stage: Stage::Fetch,
            source,
        };

        let locator = PromptLocator::parse(prompt_url).map_err(fetch_failed)?;
        let prompt = self.fetcher.fetch(&locator).await.map_err(fetch_failed)?;
        let prompt = String::from_utf8(prompt).map_err(|_| {
            fetch_failed(Error::Parse(format!("Prompt at {} is not valid UTF-8", locator)))
        })?;
        debug!(locator = %locator, prompt = %prompt, "Prompt fetched");

        let review = self
            .inference
            .run(&prompt, cancel)
            .await
            .map_err(|source| JobError {
                stage: Stage::Inference,
                source,
            })?;
        debug!(review = %review, "Review generated");

        Ok(review)
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("queue", &self.queue.name())
            .field("inference", &self.inference.name())
            .field("idle_backoff", &self.idle_backoff)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
