//! InMemoryWorkQueue - AMQP 風のセマンティクスを持つ開発用キュー
//!
//! - キューは declare してから使う
//! - 配信は `ack` / `reject` されるまで未確認のまま残る
//! - prefetch ウィンドウが埋まっている間 `next_delivery` は待機する

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::error::QueueError;
use crate::ports::{Delivery, DeliveryTag, WorkQueue};

#[derive(Debug, Clone)]
struct Message {
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    queues: HashMap<String, VecDeque<Message>>,
    /// tag -> (queue name, message)
    unacked: HashMap<DeliveryTag, (String, Message)>,
    prefetch: Option<usize>,
    next_tag: DeliveryTag,
    acked: usize,
    rejected: usize,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryWorkQueue {
    state: Mutex<QueueState>,
    /// Wakes consumers on publish, ack, reject and close.
    notify: Notify,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the transport. Waiting and future `next_delivery` calls return `None`.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    /// Wait until `queue` holds no messages and nothing is awaiting an ack.
    pub async fn wait_drained(&self, queue: &str) {
        loop {
            let notified = self.notify.notified();
            {
                let state = self.state.lock().await;
                let pending = state.queues.get(queue).map_or(0, VecDeque::len);
                if pending == 0 && state.unacked.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Put every unacknowledged delivery back at the head of its queue, as a
    /// broker does when a consumer's channel drops mid-task.
    pub async fn recover(&self) {
        let mut state = self.state.lock().await;
        let mut tags: Vec<DeliveryTag> = state.unacked.keys().copied().collect();
        tags.sort_unstable_by(|a, b| b.cmp(a));
        for tag in tags {
            if let Some((queue, mut message)) = state.unacked.remove(&tag) {
                message.redelivered = true;
                state.queues.entry(queue).or_default().push_front(message);
            }
        }
        drop(state);
        self.notify.notify_waiters();
    }

    pub async fn pending(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Prefetch window set by the consumer; `None` is unlimited.
    pub async fn prefetch(&self) -> Option<usize> {
        self.state.lock().await.prefetch
    }

    pub async fn unacked_count(&self) -> usize {
        self.state.lock().await.unacked.len()
    }

    pub async fn acked_count(&self) -> usize {
        self.state.lock().await.acked
    }

    pub async fn rejected_count(&self) -> usize {
        self.state.lock().await.rejected
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn declare(&self, queue: &str, _durable: bool) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn set_prefetch(&self, count: usize) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        // zero means "no limit", as in AMQP basic.qos
        state.prefetch = (count > 0).then_some(count);
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn publish(
        &self,
        queue: &str,
        body: Vec<u8>,
        _persistent: bool,
    ) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let Some(messages) = state.queues.get_mut(queue) else {
            return Err(QueueError::NotDeclared(queue.to_string()));
        };
        messages.push_back(Message {
            body,
            redelivered: false,
        });
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn next_delivery(&self, queue: &str) -> Result<Option<Delivery>, QueueError> {
        loop {
            // registered before the state check so a wake-up between the two is not lost
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Ok(None);
                }
                let window_full = state
                    .prefetch
                    .is_some_and(|limit| state.unacked.len() >= limit);
                if !window_full {
                    let Some(messages) = state.queues.get_mut(queue) else {
                        return Err(QueueError::NotDeclared(queue.to_string()));
                    };
                    if let Some(message) = messages.pop_front() {
                        state.next_tag += 1;
                        let tag = state.next_tag;
                        let delivery = Delivery {
                            tag,
                            body: message.body.clone(),
                            redelivered: message.redelivered,
                        };
                        state.unacked.insert(tag, (queue.to_string(), message));
                        return Ok(Some(delivery));
                    }
                }
            }
            notified.await;
        }
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if state.unacked.remove(&tag).is_none() {
            return Err(QueueError::UnknownDelivery(tag));
        }
        state.acked += 1;
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn reject(&self, tag: DeliveryTag, requeue: bool) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let Some((queue, mut message)) = state.unacked.remove(&tag) else {
            return Err(QueueError::UnknownDelivery(tag));
        };
        state.rejected += 1;
        if requeue {
            message.redelivered = true;
            state.queues.entry(queue).or_default().push_front(message);
        }
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }
}
