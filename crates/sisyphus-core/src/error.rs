use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::AgentState;

/// Errors raised while mapping an artifact reference onto the staging root.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("artifact reference '{0}' has an empty key")]
    EmptyKey(String),

    #[error("artifact key '{0}' escapes the staging root")]
    UnsafeKey(String),

    #[error("failed to create staging directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Object storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {bucket}:{key}")]
    NotFound { bucket: String, key: String },

    #[error("storage i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("storage backend: {0}")]
    Backend(String),
}

/// Container runtime failures (the runtime itself, not the command's exit code).
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to pull image {image}: {reason}")]
    Pull { image: String, reason: String },

    #[error("failed to run container {image}: {reason}")]
    Run { image: String, reason: String },
}

/// Durable work queue failures.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue {0} is not declared")]
    NotDeclared(String),

    #[error("unknown delivery tag {0}")]
    UnknownDelivery(u64),

    #[error("queue operation failed: {0}")]
    OperationFailed(String),
}

/// Streaming bus failures.
#[derive(Debug, Error)]
pub enum BusError {
    /// Reached the end of a partition; more records may arrive later.
    #[error("end of partition {partition} on topic {topic}")]
    PartitionEof { topic: String, partition: i32 },

    #[error("flush timed out with {pending} message(s) still in flight")]
    FlushTimeout { pending: usize },

    #[error("failed to encode bus message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("fatal bus error: {0}")]
    Fatal(String),
}

impl BusError {
    /// Whether the consumer loop may keep polling after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BusError::PartitionEof { .. })
    }
}

/// Everything that can abort one pipeline run.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("malformed task descriptor: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("two artifacts stage to the same path {0}")]
    StagingConflict(PathBuf),

    #[error("failed to create placeholder {path}: {source}")]
    Placeholder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("command #{index} exited with status {status}")]
    CommandFailed {
        index: usize,
        status: i64,
        output: String,
    },
}

impl TaskError {
    /// Whether running the same descriptor again must fail the same way.
    ///
    /// Bad input, unsafe keys, staging collisions and missing inputs do not
    /// change between deliveries; container and transfer failures may.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            TaskError::Decode(_)
                | TaskError::Resolve(ResolveError::EmptyKey(_) | ResolveError::UnsafeKey(_))
                | TaskError::StagingConflict(_)
                | TaskError::Storage(StorageError::NotFound { .. })
        )
    }
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Agent lifecycle failures.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no {0} configured")]
    NotConfigured(&'static str),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("agent cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: AgentState,
    },
}
