//! Impls - port の具体実装
//!
//! # 含まれる実装
//! - **InMemoryWorkQueue** / **InMemoryEventBus**: 開発用のインメモリ transport
//! - **LocalObjectStore**: ファイルシステム上のバケット
//! - **DockerCli**: `docker` バイナリ経由のコンテナ実行
//! - **RecordingRuntime**: 呼び出しを記録するテスト用ランタイム

pub mod docker;
pub mod inmem_bus;
pub mod inmem_queue;
pub mod local_store;
pub mod recording_runtime;

pub use self::docker::DockerCli;
pub use self::inmem_bus::InMemoryEventBus;
pub use self::inmem_queue::InMemoryWorkQueue;
pub use self::local_store::LocalObjectStore;
pub use self::recording_runtime::{RecordingRuntime, RunRequest};
