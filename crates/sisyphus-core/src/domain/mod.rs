//! Domain model (ids, task descriptors, artifacts, volumes, bus messages, outcomes, state).

pub mod artifact;
pub mod envelope;
pub mod ids;
pub mod outcome;
pub mod state;
pub mod task;
pub mod volume;

pub use artifact::{ArtifactRef, ArtifactResolver, Direction};
pub use envelope::{BusMessage, GLOBAL_SHUTDOWN, Inbound};
pub use ids::{AgentId, RunId};
pub use outcome::{CommandRun, ContainerExit, TaskOutcome, UploadedArtifact};
pub use state::AgentState;
pub use task::{Command, TaskDescriptor};
pub use volume::{VolumeBinding, VolumeMode, VolumeSet};
