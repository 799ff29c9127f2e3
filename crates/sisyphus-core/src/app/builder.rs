//! AgentBuilder - port を `Agent` にワイヤリングする
//!
//! `build()` は fail-fast: port の不足や不正な設定は transport に触れる前に
//! エラーとして返す。

use std::sync::Arc;

use crate::app::agent::Agent;
use crate::app::context::{AgentContext, AgentHooks, DefaultHooks};
use crate::app::ingress::{IngressManager, IngressMode};
use crate::app::pipeline::TaskPipeline;
use crate::config::AgentConfig;
use crate::domain::ArtifactResolver;
use crate::error::ConfigError;
use crate::ports::{
    Clock, ContainerRuntime, EventBus, IdGenerator, ObjectStore, SystemClock, UlidGenerator,
    WorkQueue,
};

/// # Example
/// ```ignore
/// let agent = AgentBuilder::new(config)
///     .with_work_queue(queue)
///     .with_object_store(store)
///     .with_container_runtime(Arc::new(DockerCli::new()))
///     .build()?;
/// agent.start().await?;
/// ```
pub struct AgentBuilder {
    config: AgentConfig,
    queue: Option<Arc<dyn WorkQueue>>,
    bus: Option<Arc<dyn EventBus>>,
    storage: Option<Arc<dyn ObjectStore>>,
    runtime: Option<Arc<dyn ContainerRuntime>>,
    hooks: Arc<dyn AgentHooks>,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing {0}; register it on the builder before build()")]
    MissingComponent(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AgentBuilder {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            queue: None,
            bus: None,
            storage: None,
            runtime: None,
            hooks: Arc::new(DefaultHooks),
            clock: Arc::new(SystemClock),
            ids: None,
        }
    }

    /// Required unless the config subscribes to bus topics.
    pub fn with_work_queue(mut self, queue: Arc<dyn WorkQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Required when the config subscribes to bus topics; otherwise only `send` uses it.
    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_object_store(mut self, storage: Arc<dyn ObjectStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_container_runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn AgentHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Defaults to ULIDs stamped by the builder's clock.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<Agent, BuildError> {
        self.config.validate()?;

        let storage = self
            .storage
            .ok_or(BuildError::MissingComponent("object store"))?;
        let runtime = self
            .runtime
            .ok_or(BuildError::MissingComponent("container runtime"))?;
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(self.clock.clone())));

        let mode = if self.config.uses_bus() {
            IngressMode::Bus {
                bus: self
                    .bus
                    .clone()
                    .ok_or(BuildError::MissingComponent("event bus"))?,
                topics: self.config.bus.subscribe.clone(),
                poll_timeout: self.config.bus.poll_timeout(),
            }
        } else {
            IngressMode::Queue {
                queue: self
                    .queue
                    .clone()
                    .ok_or(BuildError::MissingComponent("work queue"))?,
                name: self.config.queue.queue.clone(),
            }
        };

        let agent_id = ids.generate_agent_id();
        let ctx = Arc::new(AgentContext::new(
            agent_id,
            self.config.agent_type.clone(),
            self.bus,
            self.config.bus.flush_timeout(),
        ));
        let pipeline = Arc::new(TaskPipeline::new(
            ArtifactResolver::new(
                self.config.storage.bucket.clone(),
                self.config.storage.local_root.clone(),
            ),
            storage,
            runtime,
            self.clock,
            ids,
        ));
        let ingress = IngressManager::new(
            ctx,
            mode,
            pipeline,
            self.hooks.clone(),
            self.config.ack_policy,
        );
        tracing::debug!(%agent_id, group_id = %self.config.bus.group_id(agent_id), "agent built");

        Ok(Agent::new(self.config, ingress, self.queue, self.hooks))
    }
}
