//! IngressManager - the consumption loop of an agent.
//!
//! # Modes
//! - **Queue**: durable work queue, prefetch 1, one task in flight. Every
//!   delivery is decoded into a `TaskDescriptor` and handed to the pipeline.
//! - **Bus**: streaming bus topics. Records are decoded as JSON, control
//!   messages are handled here and the rest go to `AgentHooks::receive`.
//!
//! In both modes `preinitialize` runs after the subscription exists and before
//! the first message is handled. A failing task never stops the loop.

use std::sync::Arc;
use std::time::Duration;

use crate::app::context::{AgentContext, AgentHooks};
use crate::app::pipeline::TaskPipeline;
use crate::config::AckPolicy;
use crate::domain::{AgentState, Inbound, TaskDescriptor, TaskOutcome};
use crate::error::{AgentError, QueueError, TaskError};
use crate::observability::{IngressCounters, IngressCounts};
use crate::ports::{BusRecord, Delivery, EventBus, WorkQueue};

/// Where an agent takes its messages from.
pub enum IngressMode {
    Queue {
        queue: Arc<dyn WorkQueue>,
        name: String,
    },
    Bus {
        bus: Arc<dyn EventBus>,
        topics: Vec<String>,
        poll_timeout: Duration,
    },
}

/// What the queue is told about a handled delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    Ack,
    Requeue,
}

impl Acknowledgement {
    /// Permanent failures are always acked; requeueing them would loop forever.
    pub fn for_result(policy: AckPolicy, result: &Result<TaskOutcome, TaskError>) -> Self {
        match (policy, result) {
            (AckPolicy::Always, _) | (_, Ok(_)) => Self::Ack,
            (AckPolicy::OnSuccess, Err(err)) if err.is_permanent() => Self::Ack,
            (AckPolicy::OnSuccess, Err(_)) => Self::Requeue,
        }
    }
}

pub struct IngressManager {
    ctx: Arc<AgentContext>,
    mode: IngressMode,
    pipeline: Arc<TaskPipeline>,
    hooks: Arc<dyn AgentHooks>,
    ack_policy: AckPolicy,
    counters: IngressCounters,
}

impl IngressManager {
    pub fn new(
        ctx: Arc<AgentContext>,
        mode: IngressMode,
        pipeline: Arc<TaskPipeline>,
        hooks: Arc<dyn AgentHooks>,
        ack_policy: AckPolicy,
    ) -> Self {
        Self {
            ctx,
            mode,
            pipeline,
            hooks,
            ack_policy,
            counters: IngressCounters::default(),
        }
    }

    pub fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    pub fn counts(&self) -> IngressCounts {
        self.counters.snapshot()
    }

    /// Consume until shutdown, transport close or a fatal bus error.
    ///
    /// The agent is `Stopped` when this returns, whatever the result.
    pub async fn run(&self) -> Result<(), AgentError> {
        let result = match &self.mode {
            IngressMode::Queue { queue, name } => self.consume_queue(queue.as_ref(), name).await,
            IngressMode::Bus {
                bus,
                topics,
                poll_timeout,
            } => self.consume_bus(bus.as_ref(), topics, *poll_timeout).await,
        };
        self.ctx.finish();
        tracing::info!(agent_id = %self.ctx.id(), counts = ?self.counts(), "ingress stopped");
        result
    }

    async fn consume_queue(&self, queue: &dyn WorkQueue, name: &str) -> Result<(), AgentError> {
        queue.declare(name, true).await?;
        queue.set_prefetch(1).await?;
        if !self.advance(AgentState::Subscribed)? {
            return Ok(());
        }
        tracing::info!(queue = name, "waiting for tasks");

        self.hooks.preinitialize(&self.ctx).await;
        if !self.advance(AgentState::Running)? {
            return Ok(());
        }

        let mut state_rx = self.ctx.watch_state();
        loop {
            if self.ctx.state().is_winding_down() {
                break;
            }

            // waiting for a delivery may take forever, so race it with a state change
            let delivery = tokio::select! {
                _ = state_rx.changed() => continue,
                delivery = queue.next_delivery(name) => delivery?,
            };
            let Some(delivery) = delivery else {
                tracing::info!(queue = name, "queue closed");
                break;
            };

            self.handle_delivery(queue, delivery).await?;
        }
        Ok(())
    }

    /// Run one delivery through the pipeline and acknowledge it.
    async fn handle_delivery(
        &self,
        queue: &dyn WorkQueue,
        delivery: Delivery,
    ) -> Result<Acknowledgement, QueueError> {
        let result = match TaskDescriptor::from_slice(&delivery.body) {
            Ok(task) => self.pipeline.run(&task).await,
            Err(err) => Err(TaskError::Decode(err)),
        };

        let payload = String::from_utf8_lossy(&delivery.body);
        match &result {
            Ok(outcome) => {
                self.counters.succeeded();
                tracing::info!(run_id = %outcome.run_id, tag = delivery.tag, "task succeeded");
            }
            Err(TaskError::Decode(err)) => {
                self.counters.malformed();
                tracing::warn!(error = %err, tag = delivery.tag, %payload, "dropping malformed task");
            }
            Err(err @ TaskError::CommandFailed { output, .. }) => {
                self.counters.failed();
                tracing::error!(
                    error = %err,
                    tag = delivery.tag,
                    %output,
                    %payload,
                    "task failed"
                );
            }
            Err(err) => {
                self.counters.failed();
                tracing::error!(error = %err, tag = delivery.tag, %payload, "task failed");
            }
        }

        let ack = Acknowledgement::for_result(self.ack_policy, &result);
        match ack {
            Acknowledgement::Ack => queue.ack(delivery.tag).await?,
            Acknowledgement::Requeue => queue.reject(delivery.tag, true).await?,
        }
        Ok(ack)
    }

    async fn consume_bus(
        &self,
        bus: &dyn EventBus,
        topics: &[String],
        poll_timeout: Duration,
    ) -> Result<(), AgentError> {
        bus.subscribe(topics).await?;
        if !self.advance(AgentState::Subscribed)? {
            return Ok(());
        }
        tracing::info!(?topics, "subscribed");

        let mut initialized = false;
        while !self.ctx.state().is_winding_down() {
            let polled = bus.poll(poll_timeout).await;

            // the first poll completes the group join, so nothing sent from
            // preinitialize can be missed
            if !initialized {
                initialized = true;
                self.hooks.preinitialize(&self.ctx).await;
                if !self.advance(AgentState::Running)? {
                    break;
                }
            }

            let record = match polled {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(err) if err.is_recoverable() => {
                    tracing::debug!(error = %err, "no more records for now");
                    continue;
                }
                Err(err) => {
                    tracing::error!(error = %err, "bus consumer failed");
                    return Err(err.into());
                }
            };
            self.dispatch(record).await;
        }
        Ok(())
    }

    async fn dispatch(&self, record: BusRecord) {
        match Inbound::decode(&record.topic, &record.payload) {
            Ok(Inbound::Skip) => self.counters.skipped(),
            Ok(Inbound::Shutdown) => {
                tracing::info!(topic = %record.topic, "global shutdown received");
                self.ctx.shutdown();
            }
            Ok(Inbound::Deliver(message)) => {
                self.counters.received();
                self.hooks.receive(&self.ctx, message).await;
            }
            Err(err) => {
                self.counters.skipped();
                tracing::warn!(
                    error = %err,
                    topic = %record.topic,
                    offset = record.offset,
                    "skipping undecodable record"
                );
            }
        }
    }

    /// `Ok(false)` when a shutdown got there first.
    fn advance(&self, next: AgentState) -> Result<bool, AgentError> {
        match self.ctx.transition(next) {
            Ok(()) => Ok(true),
            Err(_) if self.ctx.state().is_winding_down() => Ok(false),
            Err(err) => Err(err),
        }
    }
}
