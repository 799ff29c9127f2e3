//! DockerCli - container runtime driven through the `docker` binary.
//!
//! Volumes are passed as `--mount type=bind,...` so staging paths may contain `:`.

use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::{ContainerExit, VolumeSet};
use crate::error::ContainerError;
use crate::ports::ContainerRuntime;

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Use another docker-compatible CLI (e.g. `podman`).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments of the `run` invocation, without the binary itself.
    pub fn run_args(image: &str, argv: &[String], volumes: &VolumeSet) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];
        for binding in volumes.iter() {
            args.push("--mount".to_string());
            args.push(binding.to_mount_spec());
        }
        args.push(image.to_string());
        args.extend(argv.iter().cloned());
        args
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn pull(&self, image: &str) -> Result<(), ContainerError> {
        let output = Command::new(&self.binary)
            .args(["pull", image])
            .output()
            .await
            .map_err(|e| ContainerError::Pull {
                image: image.to_string(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ContainerError::Pull {
                image: image.to_string(),
                reason: stderr_of(&output),
            });
        }
        Ok(())
    }

    async fn run(
        &self,
        image: &str,
        argv: &[String],
        volumes: &VolumeSet,
    ) -> Result<ContainerExit, ContainerError> {
        let output = Command::new(&self.binary)
            .args(Self::run_args(image, argv, volumes))
            .output()
            .await
            .map_err(|e| ContainerError::Run {
                image: image.to_string(),
                reason: e.to_string(),
            })?;

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));
        // killed by a signal: no exit code
        let status = output.status.code().map_or(-1, i64::from);
        Ok(ContainerExit::new(status, captured))
    }
}
