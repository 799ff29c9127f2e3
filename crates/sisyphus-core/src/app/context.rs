//! AgentContext - identity, lifecycle state and the outbound bus of one agent.
//!
//! Shared (behind `Arc`) by the ingress loop, the hooks and the `Agent` handle.
//! State lives in a `watch` channel so loops can wait on a shutdown request
//! instead of polling a flag.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::domain::{AgentId, AgentState, BusMessage};
use crate::error::AgentError;
use crate::ports::EventBus;

pub struct AgentContext {
    id: AgentId,
    agent_type: String,
    bus: Option<Arc<dyn EventBus>>,
    flush_timeout: Duration,
    state: watch::Sender<AgentState>,
}

impl AgentContext {
    pub fn new(
        id: AgentId,
        agent_type: impl Into<String>,
        bus: Option<Arc<dyn EventBus>>,
        flush_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(AgentState::Created);
        Self {
            id,
            agent_type: agent_type.into(),
            bus,
            flush_timeout,
            state,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn agent_type(&self) -> &str {
        &self.agent_type
    }

    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    /// Move to `next` if the state machine allows it.
    pub(crate) fn transition(&self, next: AgentState) -> Result<(), AgentError> {
        let mut rejected = None;
        self.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                rejected = Some(*state);
                false
            }
        });
        match rejected {
            None => Ok(()),
            Some(state) => Err(AgentError::InvalidState {
                action: "change state",
                state,
            }),
        }
    }

    /// Request a cooperative shutdown.
    ///
    /// Returns `true` only for the call that actually started it; repeated
    /// requests are no-ops.
    pub fn shutdown(&self) -> bool {
        let started = self.state.send_if_modified(|state| {
            if state.is_winding_down() || !state.can_transition_to(AgentState::ShuttingDown) {
                return false;
            }
            *state = AgentState::ShuttingDown;
            true
        });
        if started {
            tracing::info!(agent_id = %self.id, "shutdown requested");
        }
        started
    }

    /// Mark the consumption loop as finished.
    pub(crate) fn finish(&self) {
        self.state.send_if_modified(|state| {
            if *state == AgentState::Stopped {
                return false;
            }
            *state = AgentState::Stopped;
            true
        });
    }

    /// Publish `message` on `topic` and wait for the bus to flush it.
    pub async fn send(&self, topic: &str, message: &Value) -> Result<(), AgentError> {
        let bus = self
            .bus
            .as_ref()
            .ok_or(AgentError::NotConfigured("streaming bus"))?;
        self.log_message(topic, message, false);
        let payload = serde_json::to_vec(message)?;
        bus.produce(topic, payload).await?;
        bus.flush(self.flush_timeout).await?;
        Ok(())
    }

    pub(crate) fn log_message(&self, topic: &str, message: &Value, incoming: bool) {
        let event = message
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or("generic");
        tracing::info!(
            agent_type = %self.agent_type,
            agent_id = %self.id,
            "{} {} {}: {}",
            if incoming { "-->" } else { "<--" },
            topic,
            event,
            message
        );
    }
}

/// Extension points of an agent.
///
/// The defaults do nothing on `preinitialize` and log every received message.
#[async_trait]
pub trait AgentHooks: Send + Sync {
    /// Runs once, after the subscription exists and before the first message
    /// is handled. Messages sent from here cannot be missed by this agent.
    async fn preinitialize(&self, _ctx: &AgentContext) {}

    /// Handles one application message from the streaming bus.
    async fn receive(&self, ctx: &AgentContext, message: BusMessage) {
        ctx.log_message(&message.topic, &message.body, true);
    }
}

/// Hooks with the default behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

#[async_trait]
impl AgentHooks for DefaultHooks {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryEventBus;
    use serde_json::json;
    use ulid::Ulid;

    fn context(bus: Option<Arc<dyn EventBus>>) -> AgentContext {
        AgentContext::new(
            AgentId::from_ulid(Ulid::new()),
            "sisyphus",
            bus,
            Duration::from_millis(50),
        )
    }

    #[test]
    fn shutdown_is_idempotent() {
        let ctx = context(None);
        ctx.transition(AgentState::Subscribed).unwrap();
        ctx.transition(AgentState::Running).unwrap();

        assert!(ctx.shutdown());
        assert!(!ctx.shutdown());
        assert_eq!(ctx.state(), AgentState::ShuttingDown);

        ctx.finish();
        assert!(!ctx.shutdown());
        assert_eq!(ctx.state(), AgentState::Stopped);
    }

    #[test]
    fn invalid_transition_reports_current_state() {
        let ctx = context(None);
        let err = ctx.transition(AgentState::Running).unwrap_err();
        assert!(matches!(
            err,
            AgentError::InvalidState {
                state: AgentState::Created,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn shutdown_wakes_state_watchers() {
        let ctx = context(None);
        let mut rx = ctx.watch_state();
        ctx.shutdown();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), AgentState::ShuttingDown);
    }

    #[tokio::test]
    async fn send_publishes_json_and_flushes() {
        let bus = Arc::new(InMemoryEventBus::new());
        let ctx = context(Some(bus.clone()));

        ctx.send("results", &json!({"event": "DONE", "n": 1}))
            .await
            .unwrap();

        let produced = bus.produced("results").await;
        assert_eq!(produced.len(), 1);
        let body: Value = serde_json::from_slice(&produced[0]).unwrap();
        assert_eq!(body, json!({"event": "DONE", "n": 1}));
    }

    #[tokio::test]
    async fn send_surfaces_flush_timeout() {
        let bus = Arc::new(InMemoryEventBus::new());
        bus.stall_flush(true).await;
        let ctx = context(Some(bus));

        let err = ctx.send("results", &json!({"event": "DONE"})).await.unwrap_err();
        assert!(matches!(err, AgentError::Bus(crate::error::BusError::FlushTimeout { .. })));
    }

    #[tokio::test]
    async fn send_without_bus_is_not_configured() {
        let ctx = context(None);
        let err = ctx.send("results", &json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::NotConfigured("streaming bus")));
    }
}
