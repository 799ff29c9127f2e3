//! InMemoryEventBus - development streaming bus.
//!
//! One partition per topic. Produced records are visible to the subscribed
//! consumer of the same bus, and offsets are committed as soon as `poll`
//! returns a record. Errors can be injected to exercise the consumer loop.
//!
//! `OffsetReset::Latest` drops whatever a topic already holds when it is
//! subscribed, like a fresh consumer group starting at the log end.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::config::OffsetReset;
use crate::error::BusError;
use crate::ports::{BusRecord, EventBus};

#[derive(Debug, Default)]
struct BusState {
    logs: HashMap<String, VecDeque<BusRecord>>,
    next_offset: HashMap<String, i64>,
    subscribed: Vec<String>,
    injected: VecDeque<BusError>,
    produced: Vec<BusRecord>,
    in_flight: usize,
    flush_stalled: bool,
    polls: usize,
    skip_backlog: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    state: Mutex<BusState>,
    notify: Notify,
}

impl InMemoryEventBus {
    /// Reads from the earliest record.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset_reset(offset_reset: OffsetReset) -> Self {
        let mut bus = Self::default();
        bus.state.get_mut().skip_backlog = offset_reset == OffsetReset::Latest;
        bus
    }

    /// Make the next `poll` fail with `error`.
    pub async fn inject_error(&self, error: BusError) {
        self.state.lock().await.injected.push_back(error);
        self.notify.notify_waiters();
    }

    /// While stalled, `flush` never drains and times out.
    pub async fn stall_flush(&self, stalled: bool) {
        self.state.lock().await.flush_stalled = stalled;
    }

    /// Everything produced on `topic`, in order.
    pub async fn produced(&self, topic: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .await
            .produced
            .iter()
            .filter(|record| record.topic == topic)
            .map(|record| record.payload.clone())
            .collect()
    }

    /// Number of `poll` calls so far.
    pub async fn poll_count(&self) -> usize {
        self.state.lock().await.polls
    }

    pub async fn subscriptions(&self) -> Vec<String> {
        self.state.lock().await.subscribed.clone()
    }

    fn next_record(state: &mut BusState) -> Option<BusRecord> {
        let BusState {
            logs, subscribed, ..
        } = state;
        subscribed
            .iter()
            .find_map(|topic| logs.get_mut(topic).and_then(VecDeque::pop_front))
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn subscribe(&self, topics: &[String]) -> Result<(), BusError> {
        let mut state = self.state.lock().await;
        if state.skip_backlog {
            for topic in topics {
                if let Some(log) = state.logs.get_mut(topic) {
                    log.clear();
                }
            }
        }
        state.subscribed = topics.to_vec();
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<BusRecord>, BusError> {
        let deadline = Instant::now() + timeout;
        {
            let mut state = self.state.lock().await;
            state.polls += 1;
            if state.subscribed.is_empty() {
                return Err(BusError::Fatal("poll without subscription".to_string()));
            }
        }
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(error) = state.injected.pop_front() {
                    return Err(error);
                }
                if let Some(record) = Self::next_record(&mut state) {
                    return Ok(Some(record));
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn produce(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let mut state = self.state.lock().await;
        let offset = state.next_offset.entry(topic.to_string()).or_insert(0);
        let record = BusRecord {
            topic: topic.to_string(),
            partition: 0,
            offset: *offset,
            payload,
        };
        *offset += 1;
        state
            .logs
            .entry(topic.to_string())
            .or_default()
            .push_back(record.clone());
        state.produced.push(record);
        state.in_flight += 1;
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn flush(&self, timeout: Duration) -> Result<(), BusError> {
        let mut state = self.state.lock().await;
        if state.flush_stalled {
            let pending = state.in_flight;
            drop(state);
            tokio::time::sleep(timeout).await;
            return Err(BusError::FlushTimeout { pending });
        }
        state.in_flight = 0;
        Ok(())
    }
}
