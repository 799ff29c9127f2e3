//! App - アプリケーション層
//!
//! port を組み合わせてエージェントを動かす。
//!
//! # コンポーネント
//! - **AgentBuilder**: ワイヤリングと fail-fast な検証
//! - **Agent**: ライフサイクル操作（start, shutdown, send, submit）
//! - **AgentContext / AgentHooks**: 共有状態と拡張ポイント
//! - **IngressManager**: キューまたはバスの消費ループ
//! - **TaskPipeline**: 1 タスクのステージング、実行、アップロード

pub mod agent;
pub mod builder;
pub mod context;
pub mod ingress;
pub mod pipeline;

pub use self::agent::Agent;
pub use self::builder::{AgentBuilder, BuildError};
pub use self::context::{AgentContext, AgentHooks, DefaultHooks};
pub use self::ingress::{Acknowledgement, IngressManager, IngressMode};
pub use self::pipeline::TaskPipeline;
