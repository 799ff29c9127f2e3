//! Ports - 外部システムとの境界（trait 定義）
//!
//! # 含まれる port
//! - **WorkQueue**: 永続ワークキュー（prefetch, ack / reject）
//! - **EventBus**: ストリーミングバス（subscribe, poll, produce, flush）
//! - **ObjectStore**: バケット単位の download / upload
//! - **ContainerRuntime**: イメージの pull とコンテナ実行
//! - **Clock / IdGenerator**: テストで固定できるように port として切り出す

pub mod clock;
pub mod container;
pub mod event_bus;
pub mod id_generator;
pub mod object_store;
pub mod work_queue;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::container::ContainerRuntime;
pub use self::event_bus::{BusRecord, EventBus};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::object_store::ObjectStore;
pub use self::work_queue::{Delivery, DeliveryTag, WorkQueue};
