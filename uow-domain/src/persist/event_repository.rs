//! 事件仓储协议（EventRepository）
//!
//! 按聚合读取/追加序列化事件；`EventRepositoryExt` 在其上提供
//! 反序列化为 `DomainEventStream` 的便捷方法，供聚合重放使用。
//!
use crate::{
    domain_event::{DomainEvent, DomainEventStream},
    error::{DomainError, DomainResult as Result},
    persist::{SerializedEvent, deserialize_events},
};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// 读取聚合的全部事件，按序号升序
    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<SerializedEvent>>;

    /// 追加事件；序号与已有历史不连续时返回 `VersionConflict`
    async fn save(&self, events: &[SerializedEvent]) -> Result<()>;
}

#[async_trait]
pub trait EventRepositoryExt: EventRepository {
    /// 读取并反序列化指定聚合的事件流；无历史时返回 `NotFound`
    async fn read_stream<E: DomainEvent>(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<DomainEventStream<E>> {
        let serialized = self.get_events(aggregate_type, aggregate_id).await?;
        if serialized.is_empty() {
            return Err(DomainError::NotFound {
                reason: format!("no events for {aggregate_type}/{aggregate_id}"),
            });
        }

        DomainEventStream::new(deserialize_events::<E>(&serialized)?)
    }
}

#[async_trait]
impl<T> EventRepository for Arc<T>
where
    T: EventRepository + ?Sized,
{
    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<SerializedEvent>> {
        (**self).get_events(aggregate_type, aggregate_id).await
    }

    async fn save(&self, events: &[SerializedEvent]) -> Result<()> {
        (**self).save(events).await
    }
}

#[async_trait]
impl<T> EventRepositoryExt for T where T: EventRepository + ?Sized {}
