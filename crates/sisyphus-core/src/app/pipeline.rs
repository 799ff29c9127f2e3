//! TaskPipeline - runs one task descriptor end to end.
//!
//! # Flow
//! 1. download every input into `<root>/inputs/<key>`
//! 2. create an empty placeholder at `<root>/outputs/<key>` for every output
//! 3. bind inputs read-only and outputs read-write
//! 4. pull the image
//! 5. run each command in its own container, stopping at the first non-zero exit
//! 6. upload every output
//!
//! Nothing is cleaned up on failure. The pipeline keeps no state between runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Instrument;

use crate::domain::{
    ArtifactRef, ArtifactResolver, CommandRun, Direction, TaskDescriptor, TaskOutcome,
    UploadedArtifact, VolumeMode, VolumeSet,
};
use crate::error::TaskError;
use crate::ports::{Clock, ContainerRuntime, IdGenerator, ObjectStore};

/// An artifact placed in the staging tree.
#[derive(Debug, Clone)]
struct Staged {
    artifact: ArtifactRef,
    local_path: PathBuf,
    internal_path: String,
}

pub struct TaskPipeline {
    resolver: ArtifactResolver,
    storage: Arc<dyn ObjectStore>,
    runtime: Arc<dyn ContainerRuntime>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl TaskPipeline {
    pub fn new(
        resolver: ArtifactResolver,
        storage: Arc<dyn ObjectStore>,
        runtime: Arc<dyn ContainerRuntime>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            resolver,
            storage,
            runtime,
            clock,
            ids,
        }
    }

    pub fn resolver(&self) -> &ArtifactResolver {
        &self.resolver
    }

    /// Execute one task.
    pub async fn run(&self, task: &TaskDescriptor) -> Result<TaskOutcome, TaskError> {
        let run_id = self.ids.generate_run_id();
        let span = tracing::info_span!("task", %run_id, image = %task.container);
        async move {
            let started_at = self.clock.now();
            tracing::info!(
                inputs = task.inputs.len(),
                outputs = task.outputs.len(),
                commands = task.commands.len(),
                "perform task"
            );

            let inputs = self.stage_inputs(task).await?;
            let outputs = self.stage_outputs(task).await?;
            let volumes = bind_volumes(&inputs, &outputs)?;

            self.runtime.pull(&task.container).await?;

            let mut commands = Vec::with_capacity(task.commands.len());
            for (index, command) in task.commands.iter().enumerate() {
                let argv = command.container_argv();
                tracing::info!(index, ?argv, "run command");
                let exit = self.runtime.run(&task.container, &argv, &volumes).await?;
                if !exit.success() {
                    tracing::warn!(index, status = exit.status, "command failed; skipping the rest");
                    return Err(TaskError::CommandFailed {
                        index,
                        status: exit.status,
                        output: exit.output,
                    });
                }
                commands.push(CommandRun { index, argv, exit });
            }

            let uploads = self.upload_outputs(&outputs).await?;

            let outcome = TaskOutcome {
                run_id,
                image: task.container.clone(),
                commands,
                uploads,
                started_at,
                finished_at: self.clock.now(),
            };
            tracing::info!(uploads = outcome.uploads.len(), "task complete");
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    async fn stage_inputs(&self, task: &TaskDescriptor) -> Result<Vec<Staged>, TaskError> {
        let mut staged: Vec<Staged> = Vec::with_capacity(task.inputs.len());
        for (remote, internal) in &task.inputs {
            let artifact = self.resolver.parse(remote);
            let local_path = self.resolver.prepare(Direction::Inputs, &artifact.key).await?;
            ensure_unique(&staged, &local_path)?;

            tracing::debug!(%artifact, path = %local_path.display(), "download input");
            self.storage
                .download(&artifact.bucket, &artifact.key, &local_path)
                .await?;

            staged.push(Staged {
                artifact,
                local_path,
                internal_path: internal.clone(),
            });
        }
        Ok(staged)
    }

    async fn stage_outputs(&self, task: &TaskDescriptor) -> Result<Vec<Staged>, TaskError> {
        let mut staged: Vec<Staged> = Vec::with_capacity(task.outputs.len());
        for (remote, internal) in &task.outputs {
            let artifact = self.resolver.parse(remote);
            let local_path = self.resolver.prepare(Direction::Outputs, &artifact.key).await?;
            ensure_unique(&staged, &local_path)?;

            // the mount target must exist before the container starts
            tokio::fs::File::create(&local_path)
                .await
                .map_err(|source| TaskError::Placeholder {
                    path: local_path.clone(),
                    source,
                })?;

            staged.push(Staged {
                artifact,
                local_path,
                internal_path: internal.clone(),
            });
        }
        Ok(staged)
    }

    async fn upload_outputs(&self, outputs: &[Staged]) -> Result<Vec<UploadedArtifact>, TaskError> {
        let mut uploads = Vec::with_capacity(outputs.len());
        for output in outputs {
            tracing::debug!(artifact = %output.artifact, "upload output");
            self.storage
                .upload(&output.artifact.bucket, &output.local_path, &output.artifact.key)
                .await?;
            uploads.push(UploadedArtifact {
                bucket: output.artifact.bucket.clone(),
                key: output.artifact.key.clone(),
                local_path: output.local_path.clone(),
            });
        }
        Ok(uploads)
    }
}

fn ensure_unique(staged: &[Staged], local_path: &Path) -> Result<(), TaskError> {
    if staged.iter().any(|s| s.local_path == local_path) {
        return Err(TaskError::StagingConflict(local_path.to_path_buf()));
    }
    Ok(())
}

fn bind_volumes(inputs: &[Staged], outputs: &[Staged]) -> Result<VolumeSet, TaskError> {
    let mut volumes = VolumeSet::new();
    for input in inputs {
        volumes.bind(&input.local_path, &input.internal_path, VolumeMode::ReadOnly)?;
    }
    for output in outputs {
        volumes.bind(&output.local_path, &output.internal_path, VolumeMode::ReadWrite)?;
    }
    Ok(volumes)
}
