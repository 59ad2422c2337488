//! 聚合（Aggregate）抽象
//!
//! 约束一个事件溯源聚合的核心行为：
//! - `apply` 将事件投影到状态（改变状态，并推进版本）；
//! - `replay` 按序消费 `DomainEventStream` 重建状态；
//! - 通过 `Entity` 约束聚合具备标识与版本；
//! - `AggregateRoot` 是聚合的类型擦除视图，供工作单元跟踪参与者。
//!
use crate::domain_event::{DomainEvent, DomainEventStream, EventEnvelope};
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use std::any::Any;

/// 事件溯源聚合
pub trait Aggregate: Entity + Sized + 'static {
    const TYPE: &'static str;

    /// 该聚合产生的领域事件类型
    type Event: DomainEvent;

    /// 应用事件，更新聚合状态；实现需将版本推进到 `event.sequence_number()`
    fn apply(&mut self, event: &EventEnvelope<Self::Event>);

    /// 消费事件流直至耗尽，重建聚合。
    ///
    /// 聚合标识取自事件流；事件流类型与 `TYPE` 不一致时返回 `TypeMismatch`。
    fn replay(stream: &mut DomainEventStream<Self::Event>) -> DomainResult<Self> {
        if stream.aggregate_type() != Self::TYPE {
            return Err(DomainError::TypeMismatch {
                expected: Self::TYPE.to_string(),
                found: stream.aggregate_type().to_string(),
            });
        }

        let id = stream
            .aggregate_id()
            .parse::<Self::Id>()
            .map_err(|_| DomainError::InvalidAggregateId(stream.aggregate_id().to_string()))?;

        let mut aggregate = Self::new(id);
        while stream.has_next() {
            let event = stream.next_event()?;
            aggregate.apply(&event);
        }

        tracing::trace!(
            aggregate_type = Self::TYPE,
            aggregate_id = %aggregate.id(),
            version = aggregate.version(),
            "aggregate replayed"
        );

        Ok(aggregate)
    }
}

/// 聚合根的类型擦除视图：以 (类型, 标识) 区分身份
pub trait AggregateRoot: Send + Sync + 'static {
    fn aggregate_type(&self) -> &'static str;

    fn aggregate_id(&self) -> String;

    fn aggregate_version(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

impl<A> AggregateRoot for A
where
    A: Aggregate,
{
    fn aggregate_type(&self) -> &'static str {
        A::TYPE
    }

    fn aggregate_id(&self) -> String {
        self.id().to_string()
    }

    fn aggregate_version(&self) -> usize {
        self.version()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn AggregateRoot {
    /// 是否与另一个聚合根指向同一聚合（类型与标识相同）
    pub fn same_identity(&self, other: &dyn AggregateRoot) -> bool {
        self.aggregate_type() == other.aggregate_type()
            && self.aggregate_id() == other.aggregate_id()
    }

    pub fn downcast_ref<A: Aggregate>(&self) -> Option<&A> {
        self.as_any().downcast_ref::<A>()
    }
}
