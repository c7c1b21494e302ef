//! Build pipeline components from configuration

use autoreview_aws::{S3Fetcher, SqsBroker};
use autoreview_core::queue::{BrokerQueue, ListQueue};
use autoreview_core::{
    CommandRunner, Config, Error, InferenceRunner, PromptFetcher, QueueBackend, QueueSource,
    ResultPublisher, Worker,
};
use autoreview_github::{GitHubAppClient, GitHubAppCredentials};
use autoreview_redis::RedisList;

/// Queue source for the configured backend
pub async fn queue(config: &Config) -> autoreview_core::Result<Box<dyn QueueSource>> {
    match config.queue.backend {
        QueueBackend::Sqs => {
            let sqs = &config.queue.sqs;
            let url = sqs
                .queue_url
                .as_deref()
                .ok_or_else(|| Error::Config("queue.sqs.queue_url is required".to_string()))?;

            let mut broker = SqsBroker::connect(url).await;
            if let Some(ref dlq) = sqs.dead_letter_queue_url {
                broker = broker.with_dead_letter_queue(dlq);
            }
            Ok(Box::new(BrokerQueue::from_config(broker, sqs)))
        }
        QueueBackend::Redis => {
            let redis = &config.queue.redis;
            let mut list = ListQueue::new(RedisList::from_config(redis)?, &redis.list_key);
            if let Some(ref dead) = redis.dead_letter_key {
                list = list.with_dead_letter_key(dead);
            }
            Ok(Box::new(list))
        }
    }
}

/// Prompt fetcher for the configured object store
pub async fn fetcher(config: &Config) -> Box<dyn PromptFetcher> {
    Box::new(S3Fetcher::connect(config.storage.endpoint.as_deref()).await)
}

/// Inference runner for the configured command
pub fn inference(config: &Config) -> Box<dyn InferenceRunner> {
    Box::new(CommandRunner::from_config(&config.inference))
}

/// Publisher authenticated with the configured GitHub App
pub fn publisher(config: &Config) -> autoreview_core::Result<ResultPublisher> {
    let (app_id, installation_id, key_path) = config.github.identity()?;
    let credentials = GitHubAppCredentials::from_key_file(app_id, installation_id, key_path)?;
    let client = GitHubAppClient::new(credentials, config.github.api_url.as_deref())?;
    Ok(ResultPublisher::new(Box::new(client)))
}

/// Fully wired worker
pub async fn worker(config: &Config) -> autoreview_core::Result<Worker> {
    config.validate()?;

    let publisher = publisher(config)?;
    let queue = queue(config).await?;
    let fetcher = fetcher(config).await;

    Ok(Worker::new(queue, fetcher, inference(config), publisher)
        .with_idle_backoff(config.worker.idle_backoff))
}
