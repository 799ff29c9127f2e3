//! ContainerRuntime port - pull images and run one-shot containers.

use async_trait::async_trait;

use crate::domain::{ContainerExit, VolumeSet};
use crate::error::ContainerError;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn pull(&self, image: &str) -> Result<(), ContainerError>;

    /// Run `argv` in a fresh container with `volumes` attached and wait for it to exit.
    ///
    /// A non-zero exit is reported through `ContainerExit`, not as an error.
    async fn run(
        &self,
        image: &str,
        argv: &[String],
        volumes: &VolumeSet,
    ) -> Result<ContainerExit, ContainerError>;
}
