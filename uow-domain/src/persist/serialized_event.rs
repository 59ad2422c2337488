//! 事件持久化模型（SerializedEvent）
//!
//! 定义事件在持久化层与总线上的标准形态与在 `EventEnvelope` 间的转换，
//! 并提供批量序列化/反序列化的工具函数。
//!
use crate::{
    domain_event::{DomainEvent, EventEnvelope},
    error::DomainResult,
    metadata::MetaData,
};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct SerializedEvent {
    /// 事件唯一标识符
    event_id: String,
    /// 事件类型，用于区分不同的事件
    event_type: String,
    /// 事件版本，用于事件版本控制和升级
    event_version: usize,
    /// 聚合 ID，标识事件所属的聚合根实例
    aggregate_id: String,
    /// 聚合类型，用于区分不同的聚合根
    aggregate_type: String,
    /// 聚合内序号，用于乐观锁和并发控制
    sequence_number: usize,
    /// 事件发生时间
    occurred_at: DateTime<Utc>,
    /// 事件负载，存储事件的具体数据
    payload: Value,
    /// 关联元数据
    #[builder(default)]
    metadata: MetaData,
}

impl SerializedEvent {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> usize {
        self.event_version
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> usize {
        self.sequence_number
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }
}

impl<E> TryFrom<&EventEnvelope<E>> for SerializedEvent
where
    E: DomainEvent,
{
    type Error = serde_json::Error;

    fn try_from(envelope: &EventEnvelope<E>) -> Result<Self, Self::Error> {
        Ok(SerializedEvent {
            event_id: envelope.event_id().to_string(),
            event_type: envelope.payload().event_type().to_string(),
            event_version: envelope.payload().event_version(),
            aggregate_id: envelope.aggregate_id().to_string(),
            aggregate_type: envelope.aggregate_type().to_string(),
            sequence_number: envelope.sequence_number(),
            occurred_at: *envelope.occurred_at(),
            payload: serde_json::to_value(envelope.payload())?,
            metadata: envelope.metadata().clone(),
        })
    }
}

impl<E> TryFrom<&SerializedEvent> for EventEnvelope<E>
where
    E: DomainEvent,
{
    type Error = serde_json::Error;

    fn try_from(value: &SerializedEvent) -> Result<Self, Self::Error> {
        let payload: E = serde_json::from_value(value.payload.clone())?;

        Ok(EventEnvelope::builder()
            .event_id(value.event_id.clone())
            .aggregate_id(value.aggregate_id.clone())
            .aggregate_type(value.aggregate_type.clone())
            .sequence_number(value.sequence_number)
            .occurred_at(value.occurred_at)
            .payload(payload)
            .metadata(value.metadata.clone())
            .build())
    }
}

pub fn serialize_events<E>(events: &[EventEnvelope<E>]) -> DomainResult<Vec<SerializedEvent>>
where
    E: DomainEvent,
{
    let events = events
        .iter()
        .map(SerializedEvent::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

pub fn deserialize_events<E>(events: &[SerializedEvent]) -> DomainResult<Vec<EventEnvelope<E>>>
where
    E: DomainEvent,
{
    let events = events
        .iter()
        .map(EventEnvelope::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}
