//! IdGenerator port - ID 生成
//!
//! # 実装
//! - **UlidGenerator**: `Clock` のタイムスタンプ + 乱数による ULID

use crate::domain::ids::{AgentId, RunId};
use crate::ports::Clock;
use ulid::Ulid;

/// Generates identifiers that are unique across the fleet without coordination.
pub trait IdGenerator: Send + Sync {
    fn generate_agent_id(&self) -> AgentId;

    fn generate_run_id(&self) -> RunId;
}

/// ULID-based generator.
///
/// The timestamp half comes from the clock, so a `FixedClock` pins it in tests.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_agent_id(&self) -> AgentId {
        AgentId::from(self.next_ulid())
    }

    fn generate_run_id(&self) -> RunId {
        RunId::from(self.next_ulid())
    }
}
