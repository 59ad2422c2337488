//! 事件总线协议（EventBus）
//!
//! 工作单元在提交阶段按暂存顺序调用 `publish`；订阅方通过 `subscribe`
//! 获得 `'static` 事件流，可直接交给 `tokio::spawn` 消费。
//!
use crate::error::DomainResult;
use crate::persist::SerializedEvent;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use std::sync::Arc;

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: &SerializedEvent) -> DomainResult<()>;

    /// 依序发布；遇到第一个失败即停止，已发布的事件不会撤回
    async fn publish_batch(&self, events: &[SerializedEvent]) -> DomainResult<()> {
        for (published, event) in events.iter().enumerate() {
            if let Err(err) = self.publish(event).await {
                tracing::warn!(
                    event_id = event.event_id(),
                    published,
                    remaining = events.len() - published,
                    "batch publication interrupted"
                );
                return Err(err);
            }
        }
        Ok(())
    }

    async fn subscribe(&self) -> BoxStream<'static, DomainResult<SerializedEvent>>;
}

#[async_trait]
impl<T> EventBus for Arc<T>
where
    T: EventBus + ?Sized,
{
    async fn publish(&self, event: &SerializedEvent) -> DomainResult<()> {
        (**self).publish(event).await
    }

    async fn publish_batch(&self, events: &[SerializedEvent]) -> DomainResult<()> {
        (**self).publish_batch(events).await
    }

    async fn subscribe(&self) -> BoxStream<'static, DomainResult<SerializedEvent>> {
        (**self).subscribe().await
    }
}
