//! 事件总线（eventing）
//!
//! 提供事件发布/订阅的基础抽象：
//! - `EventBus`：统一发布/订阅接口；
//! - `InMemoryEventBus`：基于 `tokio::sync::broadcast` 的进程内实现。
//!
//! 工作单元在提交阶段（聚合保存之后）才会把暂存的事件发布到总线，
//! 回滚时暂存事件被丢弃。
//!
pub mod bus;
pub mod bus_inmemory;

pub use bus::EventBus;
pub use bus_inmemory::InMemoryEventBus;
