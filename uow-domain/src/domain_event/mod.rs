//! 领域事件（Domain Event）与事件流
//!
//! 定义事件载荷需要实现的最小接口（`DomainEvent`）、将事件与聚合标识/序号/元数据
//! 封装后的 `EventEnvelope`，以及按序、单次消费的聚合事件流 `DomainEventStream`。

mod domain_event_trait;
mod event_envelope;
mod event_stream;

pub use domain_event_trait::DomainEvent;
pub use event_envelope::EventEnvelope;
pub use event_stream::DomainEventStream;
