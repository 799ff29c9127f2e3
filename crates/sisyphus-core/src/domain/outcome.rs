//! Outcome model: what a successful pipeline run produced.
//!
//! Failures are reported through `TaskError`; an outcome always describes a
//! run in which every command exited zero and every output was uploaded.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::RunId;

/// Exit status and captured output of one container invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerExit {
    pub status: i64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
}

impl ContainerExit {
    pub fn new(status: i64, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// One executed command, as actually handed to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRun {
    pub index: usize,
    pub argv: Vec<String>,
    pub exit: ContainerExit,
}

/// An output written back to object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedArtifact {
    pub bucket: String,
    pub key: String,
    pub local_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub run_id: RunId,
    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandRun>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uploads: Vec<UploadedArtifact>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
