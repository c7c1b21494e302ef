//! Queue sources that yield job messages
//!
//! Both backends sit behind [`QueueSource`]; the worker never knows which one
//! it is polling.

mod broker;
mod list;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{JobMessage, Result};

pub use broker::{BrokerClient, BrokerMessage, BrokerQueue, ReceiptToken};
pub use list::{ListClient, ListQueue};

/// A job taken off the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The parsed request
    pub job: JobMessage,
    /// Backend identifier of the delivery, for logs
    pub source_id: String,
}

/// Trait for queues the worker can poll
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Get the name of this backend
    fn name(&self) -> &'static str;

    /// Take at most one job off the queue
    ///
    /// `Ok(None)` means the queue was empty. An error is never an empty poll.
    ///
    /// `cancel` may only interrupt the wait for a message, which then yields
    /// `Error::Cancelled`. A delivery that has been acknowledged is always
    /// returned.
    async fn poll(&self, cancel: &CancellationToken) -> Result<Option<Delivery>>;
}
