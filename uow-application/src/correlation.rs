//! 关联数据提供者（CorrelationDataProvider）
//!
//! 命令总线在为一条消息开启工作单元时，向各提供者收集关联数据，
//! 合并后作为该工作单元的关联数据，进而传播到处理期间创建的所有消息与事件。
//!
use crate::message::Message;
use uow_domain::metadata::MetaData;

pub const CORRELATION_ID: &str = "correlation_id";
pub const TRACE_ID: &str = "trace_id";

pub trait CorrelationDataProvider: Send + Sync {
    fn correlation_data_for(&self, message: &dyn Message) -> MetaData;
}

/// 记录消息来源：`correlation_id` 为消息标识；
/// `trace_id` 沿用消息已有的追踪标识，否则以消息标识作为链路起点
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageOriginProvider;

impl CorrelationDataProvider for MessageOriginProvider {
    fn correlation_data_for(&self, message: &dyn Message) -> MetaData {
        let trace_id = message
            .metadata()
            .get_str(TRACE_ID)
            .unwrap_or(message.identifier());

        MetaData::from([
            (CORRELATION_ID, message.identifier()),
            (TRACE_ID, trace_id),
        ])
    }
}

/// 从消息元数据中复制指定键
#[derive(Debug, Clone, Default)]
pub struct SimpleCorrelationDataProvider {
    keys: Vec<String>,
}

impl SimpleCorrelationDataProvider {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl CorrelationDataProvider for SimpleCorrelationDataProvider {
    fn correlation_data_for(&self, message: &dyn Message) -> MetaData {
        message
            .metadata()
            .subset(self.keys.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::GenericMessage;

    #[test]
    fn origin_provider_starts_or_continues_a_trace() {
        let first = GenericMessage::from_parts("m-1", (), MetaData::empty());
        let data = MessageOriginProvider.correlation_data_for(&first);
        assert_eq!(data.get_str(CORRELATION_ID), Some("m-1"));
        assert_eq!(data.get_str(TRACE_ID), Some("m-1"));

        let follow_up =
            GenericMessage::from_parts("m-2", (), MetaData::with_entry(TRACE_ID, "m-1"));
        let data = MessageOriginProvider.correlation_data_for(&follow_up);
        assert_eq!(data.get_str(CORRELATION_ID), Some("m-2"));
        assert_eq!(data.get_str(TRACE_ID), Some("m-1"));
    }

    #[test]
    fn simple_provider_copies_only_listed_keys() {
        let msg = GenericMessage::from_parts(
            "m-1",
            (),
            MetaData::from([("tenant", "acme"), ("user", "u-1"), ("noise", "x")]),
        );
        let provider = SimpleCorrelationDataProvider::new(["tenant", "user", "missing"]);

        assert_eq!(
            provider.correlation_data_for(&msg),
            MetaData::from([("tenant", "acme"), ("user", "u-1")])
        );
    }
}
