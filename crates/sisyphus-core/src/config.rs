//! Configuration types.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::AgentId;
use crate::error::ConfigError;

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent type shown in message logs.
    pub agent_type: String,
    pub queue: QueueConfig,
    pub bus: BusConfig,
    pub storage: StorageConfig,
    /// What to tell the queue after a task finishes.
    pub ack_policy: AckPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_type: "sisyphus".to_string(),
            queue: QueueConfig::default(),
            bus: BusConfig::default(),
            storage: StorageConfig::default(),
            ack_policy: AckPolicy::Always,
        }
    }
}

/// Durable work queue settings.
///
/// `host` and `port` address a broker-backed `WorkQueue`; the in-memory queue
/// ignores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub host: String,
    pub port: u16,
    /// Name of the durable queue tasks are consumed from.
    pub queue: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            queue: "tasks".to_string(),
        }
    }
}

/// Where a new consumer group starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetReset {
    Earliest,
    Latest,
}

/// Streaming bus settings.
///
/// `host` and `port` address a broker-backed `EventBus`; the in-memory bus
/// ignores them but honors `offset_reset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    /// Topics to consume. Non-empty selects streaming-bus mode.
    pub subscribe: Vec<String>,
    pub offset_reset: OffsetReset,
    pub poll_timeout_ms: u64,
    pub flush_timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9092,
            subscribe: Vec::new(),
            offset_reset: OffsetReset::Latest,
            poll_timeout_ms: 1_000,
            flush_timeout_ms: 1_000,
        }
    }
}

impl BusConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    /// Each agent consumes in its own group, so every agent sees every event.
    pub fn group_id(&self, agent_id: AgentId) -> String {
        format!("sisyphus-{agent_id}")
    }
}

/// Object storage and local staging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket used for references without a `bucket:` prefix.
    pub bucket: String,
    /// Root of the local staging tree (`<root>/inputs`, `<root>/outputs`).
    pub local_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "sisyphus".to_string(),
            local_root: std::env::temp_dir().join("sisyphus"),
        }
    }
}

/// Acknowledgment policy for durable-queue deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// Ack every delivery once handled, failed or not. Poison messages are dropped.
    Always,
    /// Ack successes; reject failures with requeue.
    OnSuccess,
}

impl AgentConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.queue.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "queue.queue".to_string(),
                message: "queue name must not be empty".to_string(),
            });
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "storage.bucket".to_string(),
                message: "default bucket must not be empty".to_string(),
            });
        }
        if self.bus.poll_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "bus.poll_timeout_ms".to_string(),
                message: "poll timeout must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Streaming-bus mode is on when there is something to subscribe to.
    pub fn uses_bus(&self) -> bool {
        !self.bus.subscribe.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config: AgentConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.queue.host, "localhost");
        assert_eq!(config.queue.queue, "tasks");
        assert_eq!(config.storage.bucket, "sisyphus");
        assert_eq!(config.bus.poll_timeout(), Duration::from_secs(1));
        assert!(!config.uses_bus());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: AgentConfig = serde_json::from_str(
            r#"{"bus": {"subscribe": ["control"], "offset_reset": "earliest"}, "ack_policy": "on_success"}"#,
        )
        .unwrap();
        assert!(config.uses_bus());
        assert_eq!(config.bus.offset_reset, OffsetReset::Earliest);
        assert_eq!(config.bus.flush_timeout_ms, 1_000);
        assert_eq!(config.ack_policy, AckPolicy::OnSuccess);
    }

    #[test]
    fn validate_rejects_empty_queue_name() {
        let mut config = AgentConfig::default();
        config.queue.queue = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "queue.queue"
        ));
    }

    #[test]
    fn load_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(&path, r#"{"storage": {"bucket": "lab"}}"#).unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.storage.bucket, "lab");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = AgentConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
