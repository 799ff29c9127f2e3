//! WorkQueue port - durable task queue with manual acknowledgment.
//!
//! Implementations must honor the prefetch limit: no delivery is handed out
//! while `prefetch` deliveries are still unacknowledged.

use async_trait::async_trait;

use crate::error::QueueError;

pub type DeliveryTag = u64;

/// One message handed to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub body: Vec<u8>,
    /// Set when the message was handed out before and never acknowledged.
    pub redelivered: bool,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Declare a named queue. Declaring an existing queue is a no-op.
    async fn declare(&self, queue: &str, durable: bool) -> Result<(), QueueError>;

    /// Cap the number of unacknowledged deliveries.
    async fn set_prefetch(&self, count: usize) -> Result<(), QueueError>;

    async fn publish(&self, queue: &str, body: Vec<u8>, persistent: bool)
    -> Result<(), QueueError>;

    /// Wait for the next delivery. `None` means the transport was closed.
    async fn next_delivery(&self, queue: &str) -> Result<Option<Delivery>, QueueError>;

    async fn ack(&self, tag: DeliveryTag) -> Result<(), QueueError>;

    /// Negative acknowledgment. With `requeue` the message goes back to the queue.
    async fn reject(&self, tag: DeliveryTag, requeue: bool) -> Result<(), QueueError>;
}
