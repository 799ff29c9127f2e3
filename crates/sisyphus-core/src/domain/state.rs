//! State - エージェントのライフサイクル状態

use serde::{Deserialize, Serialize};

/// Readiness of an agent.
///
/// State transitions:
/// - Created -> Subscribed -> Running -> ShuttingDown -> Stopped
/// - Subscribed / Running -> Stopped (transport closed or fatal transport error)
/// - Created / Subscribed -> ShuttingDown (shutdown requested before the loop started)
/// - Created -> Stopped (never started)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentState {
    /// Constructed, transports not yet subscribed.
    Created,

    /// Subscription established, `preinitialize` not yet run.
    Subscribed,

    /// Consuming messages.
    Running,

    /// Shutdown requested; the loop exits at the end of its current iteration.
    ShuttingDown,

    /// Loop exited.
    Stopped,
}

impl AgentState {
    pub fn can_transition_to(self, next: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, next),
            (Created, Subscribed)
                | (Created, ShuttingDown)
                | (Created, Stopped)
                | (Subscribed, Running)
                | (Subscribed, ShuttingDown)
                | (Subscribed, Stopped)
                | (Running, ShuttingDown)
                | (Running, Stopped)
                | (ShuttingDown, Stopped)
        )
    }

    /// Is a shutdown already underway or finished?
    pub fn is_winding_down(self) -> bool {
        matches!(self, AgentState::ShuttingDown | AgentState::Stopped)
    }
}
