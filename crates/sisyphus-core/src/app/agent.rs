//! Agent - handle over one running worker process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::app::context::{AgentContext, AgentHooks};
use crate::app::ingress::IngressManager;
use crate::config::AgentConfig;
use crate::domain::{AgentId, AgentState, BusMessage, TaskDescriptor};
use crate::error::AgentError;
use crate::observability::IngressCounts;
use crate::ports::WorkQueue;

/// A configured agent. Built by `AgentBuilder`.
///
/// `start` blocks the calling task until the ingress loop ends; the other
/// methods may be called concurrently from elsewhere.
pub struct Agent {
    config: AgentConfig,
    ingress: IngressManager,
    queue: Option<Arc<dyn WorkQueue>>,
    hooks: Arc<dyn AgentHooks>,
    started: AtomicBool,
}

impl Agent {
    pub(crate) fn new(
        config: AgentConfig,
        ingress: IngressManager,
        queue: Option<Arc<dyn WorkQueue>>,
        hooks: Arc<dyn AgentHooks>,
    ) -> Self {
        Self {
            config,
            ingress,
            queue,
            hooks,
            started: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> AgentId {
        self.context().id()
    }

    pub fn state(&self) -> AgentState {
        self.context().state()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<AgentContext> {
        self.ingress.context()
    }

    pub fn counts(&self) -> IngressCounts {
        self.ingress.counts()
    }

    /// Run the ingress loop until shutdown. An agent starts at most once.
    pub async fn start(&self) -> Result<(), AgentError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(AgentError::InvalidState {
                action: "start",
                state: self.state(),
            });
        }
        tracing::info!(
            agent_id = %self.id(),
            agent_type = %self.config.agent_type,
            bus = self.config.uses_bus(),
            "starting agent"
        );
        self.ingress.run().await
    }

    /// Request a cooperative shutdown. Safe to call any number of times.
    pub fn shutdown(&self) -> bool {
        self.context().shutdown()
    }

    /// Publish a JSON message on the streaming bus.
    pub async fn send(&self, topic: &str, message: &Value) -> Result<(), AgentError> {
        self.context().send(topic, message).await
    }

    /// Hand a message to the receive hook as if it came from the bus.
    pub async fn receive(&self, message: BusMessage) {
        self.hooks.receive(self.context(), message).await;
    }

    /// Enqueue a task on the configured durable queue as a persistent message.
    pub async fn submit(&self, task: &TaskDescriptor) -> Result<(), AgentError> {
        let queue = self
            .queue
            .as_ref()
            .ok_or(AgentError::NotConfigured("work queue"))?;
        let name = &self.config.queue.queue;
        let body = serde_json::to_vec(task)?;
        queue.declare(name, true).await?;
        queue.publish(name, body, true).await?;
        tracing::debug!(queue = %name, image = %task.container, "task submitted");
        Ok(())
    }
}
