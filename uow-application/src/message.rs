//! 消息（Message）
//!
//! 消息由标识、载荷与元数据组成。通过 `GenericMessage::new`/`with_metadata` 创建的消息
//! 会自动携带当前工作单元的关联数据（消息自身的元数据优先）。
//!
use crate::current_unit_of_work::CurrentUnitOfWork;
use serde::{Deserialize, Serialize};
use uow_domain::metadata::MetaData;
use uuid::Uuid;

/// 消息的类型擦除视图
pub trait Message: Send + Sync {
    fn identifier(&self) -> &str;

    fn metadata(&self) -> &MetaData;

    fn payload_type(&self) -> &'static str;
}

/// 将当前工作单元的关联数据与 `metadata` 合并（`metadata` 优先）；
/// 当前上下文没有工作单元时原样返回
pub fn correlated(metadata: MetaData) -> MetaData {
    let correlation = CurrentUnitOfWork::correlation_data();
    if correlation.is_empty() {
        metadata
    } else {
        correlation.merged_with(&metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericMessage<P> {
    identifier: String,
    payload: P,
    metadata: MetaData,
}

impl<P> GenericMessage<P> {
    pub fn new(payload: P) -> Self {
        Self::with_metadata(payload, MetaData::empty())
    }

    pub fn with_metadata(payload: P, metadata: MetaData) -> Self {
        Self::from_parts(Uuid::new_v4().to_string(), payload, correlated(metadata))
    }

    /// 以既有的组成部分重建消息，不附加关联数据
    pub fn from_parts(identifier: impl Into<String>, payload: P, metadata: MetaData) -> Self {
        Self {
            identifier: identifier.into(),
            payload,
            metadata,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    /// 追加元数据（新值优先），标识不变
    pub fn and_metadata(self, additional: &MetaData) -> Self {
        if additional.is_empty() {
            return self;
        }
        let metadata = self.metadata.merged_with(additional);
        Self { metadata, ..self }
    }

    /// 整体替换元数据，标识不变
    pub fn with_replaced_metadata(self, metadata: MetaData) -> Self {
        Self { metadata, ..self }
    }
}

impl<P: Send + Sync> Message for GenericMessage<P> {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    fn payload_type(&self) -> &'static str {
        std::any::type_name::<P>()
    }
}
