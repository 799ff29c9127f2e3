//! sisyphus-core
//!
//! Building blocks for Sisyphus worker agents: take a task descriptor from a
//! durable queue, stage its artifacts, run its commands in containers and
//! upload the results. Agents can also react to JSON events on a streaming bus.
//!
//! # Modules
//! - **domain**: task descriptors, artifact references, volumes, bus messages, state
//! - **ports**: WorkQueue, EventBus, ObjectStore, ContainerRuntime, Clock, IdGenerator
//! - **app**: builder, agent, ingress loop, task pipeline
//! - **impls**: in-memory transports, local object store, docker CLI runtime

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{Agent, AgentBuilder, AgentContext, AgentHooks, BuildError};
pub use config::AgentConfig;
pub use domain::{BusMessage, Command, TaskDescriptor};
pub use error::{AgentError, TaskError};
