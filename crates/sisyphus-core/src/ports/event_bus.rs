//! EventBus port - topic-partitioned streaming bus.
//!
//! Consumers auto-commit offsets: a record returned by `poll` is never handed
//! out again to the same consumer group.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BusError;

/// A raw record as read from a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn subscribe(&self, topics: &[String]) -> Result<(), BusError>;

    /// Wait up to `timeout` for a record. `Ok(None)` means the wait timed out.
    async fn poll(&self, timeout: Duration) -> Result<Option<BusRecord>, BusError>;

    /// Queue a payload for delivery.
    async fn produce(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Block until queued payloads are delivered or `timeout` passes.
    async fn flush(&self, timeout: Duration) -> Result<(), BusError>;
}
