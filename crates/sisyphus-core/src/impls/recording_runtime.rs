//! RecordingRuntime - container runtime double that records every call.
//!
//! Runs succeed with status 0 unless an effect says otherwise. An effect can
//! also write into the staged files, standing in for what the container would
//! have produced.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::{ContainerExit, VolumeSet};
use crate::error::ContainerError;
use crate::ports::ContainerRuntime;

/// One recorded `run` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub image: String,
    pub argv: Vec<String>,
    pub volumes: VolumeSet,
}

type Effect = dyn Fn(&RunRequest) -> ContainerExit + Send + Sync;

#[derive(Default)]
pub struct RecordingRuntime {
    pulls: Mutex<Vec<String>>,
    runs: Mutex<Vec<RunRequest>>,
    effect: Option<Arc<Effect>>,
    failing_pull: bool,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_effect<F>(mut self, effect: F) -> Self
    where
        F: Fn(&RunRequest) -> ContainerExit + Send + Sync + 'static,
    {
        self.effect = Some(Arc::new(effect));
        self
    }

    /// Every `pull` fails.
    pub fn with_failing_pull(mut self) -> Self {
        self.failing_pull = true;
        self
    }

    pub fn pulls(&self) -> Vec<String> {
        self.pulls.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn runs(&self) -> Vec<RunRequest> {
        self.runs.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn pull(&self, image: &str) -> Result<(), ContainerError> {
        if let Ok(mut pulls) = self.pulls.lock() {
            pulls.push(image.to_string());
        }
        if self.failing_pull {
            return Err(ContainerError::Pull {
                image: image.to_string(),
                reason: "manifest unknown".to_string(),
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
        let request = RunRequest {
            image: image.to_string(),
            argv: argv.to_vec(),
            volumes: volumes.clone(),
        };
        let exit = match &self.effect {
            Some(effect) => effect(&request),
            None => ContainerExit::new(0, ""),
        };
        if let Ok(mut runs) = self.runs.lock() {
            runs.push(request);
        }
        Ok(exit)
    }
}
