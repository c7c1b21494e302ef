//! Broker queue variant: receive with visibility timeout, delete by receipt

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{Delivery, QueueSource};
use crate::config::SqsConfig;
use crate::{Error, JobMessage, Result};

/// Opaque proof of one delivery, needed to delete it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptToken(String);

impl ReceiptToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A message as returned by the broker's receive call
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub message_id: String,
    pub body: String,
    pub receipt: ReceiptToken,
    /// How many times the broker has handed this message out, including now
    pub receive_count: u32,
}

/// Low-level broker operations
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Receive up to `max_messages`, hiding them for `visibility_timeout`
    async fn receive(
        &self,
        max_messages: i32,
        visibility_timeout: Duration,
        wait_time: Duration,
    ) -> Result<Vec<BrokerMessage>>;

    /// Acknowledge a delivery
    async fn delete(&self, receipt: &ReceiptToken) -> Result<()>;

    /// Park a poison message somewhere it will not be redelivered from
    ///
    /// Returns `false` when no dead-letter destination exists.
    async fn dead_letter(&self, message: &BrokerMessage) -> Result<bool>;
}

/// Queue source over a [`BrokerClient`]
#[derive(Debug)]
pub struct BrokerQueue<C> {
    client: C,
    visibility_timeout: Duration,
    wait_time: Duration,
    max_receive_count: u32,
}

impl<C: BrokerClient> BrokerQueue<C> {
    /// Create a queue source with default timings
    pub fn new(client: C) -> Self {
        Self::from_config(client, &SqsConfig::default())
    }

    /// Create a queue source using the timings in `config`
    pub fn from_config(client: C, config: &SqsConfig) -> Self {
        Self {
            client,
            visibility_timeout: config.visibility_timeout,
            wait_time: config.wait_time,
            max_receive_count: config.max_receive_count.max(1),
        }
    }

    /// Set the receive count at which unparseable messages are dead-lettered
    pub fn with_max_receive_count(mut self, count: u32) -> Self {
        self.max_receive_count = count.max(1);
        self
    }

    /// Get the underlying client
    pub fn client(&self) -> &C {
        &self.client
    }

    async fn reject(&self, message: &BrokerMessage, err: &Error) -> Result<()> {
        if message.receive_count < self.max_receive_count {
            warn!(
                message_id = %message.message_id,
                receive_count = message.receive_count,
                max_receive_count = self.max_receive_count,
                error = %err,
                "Unparseable message left for redelivery"
            );
            return Ok(());
        }

        if self.client.dead_letter(message).await? {
            warn!(message_id = %message.message_id, "Poison message moved to dead-letter queue");
        } else {
            error!(
                message_id = %message.message_id,
                body = %message.body,
                "Poison message dropped, no dead-letter queue configured"
            );
        }
        self.client.delete(&message.receipt).await
    }
}

#[async_trait]
impl<C: BrokerClient> QueueSource for BrokerQueue<C> {
    fn name(&self) -> &'static str {
        "sqs"
    }

    async fn poll(&self, cancel: &CancellationToken) -> Result<Option<Delivery>> {
        // A receive dropped here only hides its message until the visibility
        // timeout runs out.
        let mut messages = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            received = self.client.receive(1, self.visibility_timeout, self.wait_time) => received?,
        };

        if messages.is_empty() {
            return Ok(None);
        }
        if messages.len() > 1 {
            warn!(
                count = messages.len(),
                "Broker returned more messages than requested, ignoring extras"
            );
        }
        let message = messages.swap_remove(0);

        debug!(message_id = %message.message_id, body = %message.body, "Received message");

        let job = match JobMessage::parse(message.body.as_bytes()) {
            Ok(job) => job,
            Err(err) => {
                if let Err(reject_err) = self.reject(&message, &err).await {
                    warn!(
                        message_id = %message.message_id,
                        error = %reject_err,
                        "Failed to dead-letter message"
                    );
                }
                return Err(err);
            }
        };

        // Acknowledge before processing; a crash from here on loses the job.
        self.client.delete(&message.receipt).await?;

        Ok(Some(Delivery {
            job,
            source_id: message.message_id,
        }))
    }
}
