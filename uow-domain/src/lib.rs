//! 工作单元领域层基础库（uow-domain）
//!
//! 提供工作单元协调引擎所依赖的领域层构件：
//! - 消息元数据（`metadata`）：不可变、右偏合并的关联数据容器；
//! - 领域事件（`domain_event`）与按序单次消费的聚合事件流；
//! - 聚合（`aggregate`）与实体（`entity`）建模，以及基于事件流的重放；
//! - 事件仓储协议与持久化形态（`persist`）；
//! - 事件总线（`eventing`）：发布/订阅协议与内存实现。
//!
//! 本 crate 与存储与传输实现解耦，仅定义领域层接口与最小必要的错误类型，
//! 工作单元、关联数据传播与命令分发位于 `uow-application`。
//!
//! 典型用法：
//! 1. 定义聚合与事件，实现 `Aggregate::apply`；
//! 2. 通过 `EventRepositoryExt::read_stream` 读取 `DomainEventStream`；
//! 3. 调用 `Aggregate::replay` 重建聚合状态。
//!
pub mod aggregate;
pub mod domain_event;
pub mod entity;
pub mod error;
#[cfg(feature = "eventing")]
pub mod eventing;
pub mod metadata;
pub mod persist;
