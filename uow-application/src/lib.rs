//! 工作单元应用层（uow-application）
//!
//! - `UnitOfWork`：一次逻辑操作的提交/回滚协调，按阶段通知监听器；
//! - `CurrentUnitOfWork`：按执行上下文隔离的工作单元栈；
//! - `GenericMessage` 与关联数据提供者：在消息间传播关联数据；
//! - `InMemoryCommandBus`：在工作单元内分发命令；
//! - `EventSourcingRepository`：重放加载聚合，提交时追加并发布事件。
//!
pub mod command;
pub mod command_bus;
pub mod command_handler;
pub mod correlation;
pub mod current_unit_of_work;
pub mod error;
pub mod inmemory_command_bus;
pub mod inmemory_event_repository;
pub mod listener;
pub mod message;
pub mod repository;
pub mod unit_of_work;

pub use current_unit_of_work::CurrentUnitOfWork;
pub use inmemory_command_bus::InMemoryCommandBus;
pub use inmemory_event_repository::InMemoryEventRepository;
pub use repository::EventSourcingRepository;
pub use unit_of_work::{PostCommitPolicy, UnitOfWork, UnitOfWorkConfig, UnitOfWorkStatus};
