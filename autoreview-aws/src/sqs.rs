//! SQS broker client

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};
use aws_sdk_sqs::Client;
use autoreview_core::queue::{BrokerClient, BrokerMessage, ReceiptToken};
use autoreview_core::Result;
use tracing::{debug, info, warn};

use crate::sdk_error;

/// Longest long-poll wait SQS accepts
const MAX_WAIT_SECONDS: i32 = 20;

/// Longest visibility timeout SQS accepts (12 hours)
const MAX_VISIBILITY_SECONDS: i32 = 43_200;

/// Broker client backed by an SQS queue
#[derive(Debug, Clone)]
pub struct SqsBroker {
    client: Client,
    queue_url: String,
    dead_letter_queue_url: Option<String>,
}

impl SqsBroker {
    /// Create a broker from an existing SDK client
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            dead_letter_queue_url: None,
        }
    }

    /// Create a broker using the default AWS configuration chain
    pub async fn connect(queue_url: impl Into<String>) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let queue_url = queue_url.into();
        info!(queue_url = %queue_url, "Created SQS client");
        Self::new(Client::new(&sdk_config), queue_url)
    }

    /// Forward poison messages to `url`
    pub fn with_dead_letter_queue(mut self, url: impl Into<String>) -> Self {
        self.dead_letter_queue_url = Some(url.into());
        self
    }
}

#[async_trait]
impl BrokerClient for SqsBroker {
    async fn receive(
        &self,
        max_messages: i32,
        visibility_timeout: Duration,
        wait_time: Duration,
    ) -> Result<Vec<BrokerMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .visibility_timeout(seconds(visibility_timeout, MAX_VISIBILITY_SECONDS))
            .wait_time_seconds(seconds(wait_time, MAX_WAIT_SECONDS))
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| sdk_error("SQS ReceiveMessage failed", e))?;

        let messages = output.messages.unwrap_or_default();
        debug!(count = messages.len(), "SQS receive returned");

        Ok(messages.into_iter().filter_map(convert_message).collect())
    }

    async fn delete(&self, receipt: &ReceiptToken) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt.as_str())
            .send()
            .await
            .map_err(|e| sdk_error("SQS DeleteMessage failed", e))?;
        Ok(())
    }

    async fn dead_letter(&self, message: &BrokerMessage) -> Result<bool> {
        let Some(ref dlq) = self.dead_letter_queue_url else {
            return Ok(false);
        };

        self.client
            .send_message()
            .queue_url(dlq)
            .message_body(&message.body)
            .send()
            .await
            .map_err(|e| sdk_error("SQS SendMessage to dead-letter queue failed", e))?;
        Ok(true)
    }
}

/// Whole seconds, clamped to what SQS accepts
fn seconds(duration: Duration, max: i32) -> i32 {
    i32::try_from(duration.as_secs()).map_or(max, |s| s.min(max))
}

/// Convert an SDK message, skipping ones that cannot be acknowledged
fn convert_message(message: Message) -> Option<BrokerMessage> {
    let receive_count = message
        .attributes()
        .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
        .and_then(|count| count.parse().ok())
        .unwrap_or(1);

    let message_id = message.message_id.unwrap_or_default();
    let Some(receipt) = message.receipt_handle else {
        warn!(message_id = %message_id, "SQS message without receipt handle skipped");
        return None;
    };

    Some(BrokerMessage {
        message_id,
        body: message.body.unwrap_or_default(),
        receipt: ReceiptToken::new(receipt),
        receive_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_clamped() {
        assert_eq!(seconds(Duration::from_secs(60), MAX_VISIBILITY_SECONDS), 60);
        assert_eq!(seconds(Duration::from_millis(1500), MAX_WAIT_SECONDS), 1);
        assert_eq!(seconds(Duration::from_secs(90), MAX_WAIT_SECONDS), 20);
        assert_eq!(seconds(Duration::from_secs(u64::MAX), MAX_WAIT_SECONDS), 20);
    }

    #[test]
    fn test_convert_message() {
        let message = Message::builder()
            .message_id("m-1")
            .receipt_handle("handle-1")
            .body("{}")
            .attributes(MessageSystemAttributeName::ApproximateReceiveCount, "4")
            .build();

        let converted = convert_message(message).unwrap();
        assert_eq!(converted.message_id, "m-1");
        assert_eq!(converted.receipt.as_str(), "handle-1");
        assert_eq!(converted.body, "{}");
        assert_eq!(converted.receive_count, 4);
    }

    #[test]
    fn test_convert_message_defaults_receive_count() {
        let message = Message::builder().message_id("m-2").receipt_handle("h").build();
        assert_eq!(convert_message(message).unwrap().receive_count, 1);
    }

    #[test]
    fn test_convert_message_without_receipt_skipped() {
        let message = Message::builder().message_id("m-3").body("{}").build();
        assert!(convert_message(message).is_none());
    }
}
