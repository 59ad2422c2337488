use crate::metadata::MetaData;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 事件信封：事件载荷 + 所属聚合标识 + 在聚合历史中的序号 + 元数据
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    /// 事件唯一标识
    #[builder(into, default = Uuid::new_v4().to_string())]
    event_id: String,
    /// 聚合 ID
    #[builder(into)]
    aggregate_id: String,
    /// 聚合类型
    #[builder(into)]
    aggregate_type: String,
    /// 聚合内序号（从 1 开始，严格递增）
    sequence_number: usize,
    /// 事件发生时间
    #[builder(default = Utc::now())]
    occurred_at: DateTime<Utc>,
    /// 事件载荷
    payload: E,
    /// 关联元数据
    #[builder(default)]
    metadata: MetaData,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        sequence_number: usize,
        payload: E,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            sequence_number,
            occurred_at: Utc::now(),
            payload,
            metadata: MetaData::empty(),
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
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

    pub fn occurred_at(&self) -> &DateTime<Utc> {
        &self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// 替换元数据
    pub fn with_metadata(self, metadata: MetaData) -> Self {
        Self { metadata, ..self }
    }

    /// 合并元数据（同名键以 `metadata` 为准）
    pub fn and_metadata(self, metadata: &MetaData) -> Self {
        let metadata = self.metadata.merged_with(metadata);
        Self { metadata, ..self }
    }
}
