//! List queue variant: atomic pop, no acknowledgment

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{Delivery, QueueSource};
use crate::{JobMessage, Result};

/// Low-level list operations
#[async_trait]
pub trait ListClient: Send + Sync {
    /// Remove and return the head of the list, `None` when empty
    async fn pop(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Append a value to the tail of the list
    async fn push(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Queue source over a [`ListClient`]
///
/// The pop is the consume step. A job that fails after it has been popped is
/// gone for good.
#[derive(Debug)]
pub struct ListQueue<C> {
    client: C,
    key: String,
    dead_letter_key: Option<String>,
}

impl<C: ListClient> ListQueue<C> {
    /// Create a queue source popping from `key`
    pub fn new(client: C, key: impl Into<String>) -> Self {
        Self {
            client,
            key: key.into(),
            dead_letter_key: None,
        }
    }

    /// Push unparseable payloads to `key` instead of dropping them
    pub fn with_dead_letter_key(mut self, key: impl Into<String>) -> Self {
        self.dead_letter_key = Some(key.into());
        self
    }

    /// Get the underlying client
    pub fn client(&self) -> &C {
        &self.client
    }
}

#[async_trait]
impl<C: ListClient> QueueSource for ListQueue<C> {
    fn name(&self) -> &'static str {
        "redis"
    }

    // The pop is a single round trip and is never raced against `_cancel`;
    // dropping it mid-flight could lose a popped payload.
    async fn poll(&self, _cancel: &CancellationToken) -> Result<Option<Delivery>> {
        let Some(raw) = self.client.pop(&self.key).await? else {
            return Ok(None);
        };

        debug!(key = %self.key, body = %String::from_utf8_lossy(&raw), "Popped message");

        match JobMessage::parse(&raw) {
            Ok(job) => Ok(Some(Delivery {
                job,
                source_id: self.key.clone(),
            })),
            Err(err) => {
                match &self.dead_letter_key {
                    Some(dead) => match self.client.push(dead, &raw).await {
                        Ok(()) => {
                            warn!(key = %dead, "Unparseable payload moved to dead-letter list")
                        }
                        Err(push_err) => {
                            error!(key = %dead, error = %push_err, "Failed to dead-letter payload")
                        }
                    },
                    None => error!(
                        body = %String::from_utf8_lossy(&raw),
                        "Unparseable payload dropped"
                    ),
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeList {
        lists: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    }

    impl FakeList {
        fn seeded(key: &str, values: &[&str]) -> Self {
            let list = Self::default();
            list.lists.lock().unwrap().insert(
                key.to_string(),
                values.iter().map(|v| v.as_bytes().to_vec()).collect(),
            );
            list
        }

        fn len(&self, key: &str) -> usize {
            self.lists.lock().unwrap().get(key).map_or(0, VecDeque::len)
        }
    }

    #[async_trait]
    impl ListClient for FakeList {
        async fn pop(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self
                .lists
                .lock()
                .unwrap()
                .get_mut(key)
                .and_then(VecDeque::pop_front))
        }

        async fn push(&self, key: &str, value: &[u8]) -> Result<()> {
            self.lists
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_default()
                .push_back(value.to_vec());
            Ok(())
        }
    }

    const JOB: &str = r#"{"RunNumber":3,"PrNumber":8,"OwnerName":"acme","RepoName":"widgets",
        "BaseRef":"main","HeadRef":"fix","PromptUrl":"s3://b/k"}"#;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn test_pop_on_empty_list_is_empty() {
        let queue = ListQueue::new(FakeList::default(), "review-request");
        assert!(queue.poll(&token()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pop_removes_exactly_one() {
        let list = FakeList::seeded("review-request", &[JOB, JOB]);
        let queue = ListQueue::new(list, "review-request");

        let delivery = queue.poll(&token()).await.unwrap().unwrap();
        assert_eq!(delivery.job.pr_number, 8);
        assert_eq!(delivery.source_id, "review-request");
        assert_eq!(queue.client().len("review-request"), 1);
    }

    #[tokio::test]
    async fn test_other_keys_untouched() {
        let queue = ListQueue::new(FakeList::seeded("other", &[JOB]), "review-request");
        assert!(queue.poll(&token()).await.unwrap().is_none());
        assert_eq!(queue.client().len("other"), 1);
    }

    #[tokio::test]
    async fn test_unparseable_payload_is_consumed() {
        let queue = ListQueue::new(FakeList::seeded("q", &["garbage", JOB]), "q");

        assert!(matches!(queue.poll(&token()).await, Err(Error::Parse(_))));
        // The bad payload is gone; the next poll sees the good one
        assert!(queue.poll(&token()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cancelled_token_does_not_drop_popped_job() {
        let queue = ListQueue::new(FakeList::seeded("q", &[JOB]), "q");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let delivery = queue.poll(&cancel).await.unwrap().unwrap();
        assert_eq!(delivery.job.pr_number, 8);
    }

    #[tokio::test]
    async fn test_unparseable_payload_dead_lettered() {
        let queue = ListQueue::new(FakeList::seeded("q", &["{\"PrNumber\": 1}"]), "q")
            .with_dead_letter_key("q:dead");

        assert!(queue.poll(&token()).await.is_err());
        assert_eq!(queue.client().len("q"), 0);
        assert_eq!(queue.client().len("q:dead"), 1);
    }
}
