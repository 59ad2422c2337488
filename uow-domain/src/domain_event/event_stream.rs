use super::event_envelope::EventEnvelope;
use crate::error::{DomainError, DomainResult};
use std::iter::FusedIterator;
use std::vec::IntoIter;

/// 单个聚合的事件流：按序、惰性、只前进、只消费一次。
///
/// 聚合标识与类型取自第一个事件，因此流至少包含一个事件；
/// 需要重新消费时，应重新创建事件流。
///
/// 不支持多个读者并发消费（`has_next`/`next_event` 共享游标）。
#[derive(Debug)]
pub struct DomainEventStream<E> {
    aggregate_id: String,
    aggregate_type: String,
    events: IntoIter<EventEnvelope<E>>,
    last_sequence_number: Option<usize>,
}

impl<E> DomainEventStream<E> {
    /// 从有序事件序列创建事件流。
    ///
    /// 以下情况返回 `DomainError::InvalidArgument`：
    /// - 序列为空；
    /// - 事件属于不同聚合；
    /// - 序号不连续或非递增。
    pub fn new(events: Vec<EventEnvelope<E>>) -> DomainResult<Self> {
        let Some(first) = events.first() else {
            return Err(DomainError::invalid_argument("at least one event required"));
        };

        let aggregate_id = first.aggregate_id().to_string();
        let aggregate_type = first.aggregate_type().to_string();

        for pair in events.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.aggregate_id() != aggregate_id || next.aggregate_type() != aggregate_type {
                return Err(DomainError::invalid_argument(format!(
                    "events belong to more than one aggregate: {aggregate_type}/{aggregate_id} and {}/{}",
                    next.aggregate_type(),
                    next.aggregate_id()
                )));
            }
            let Some(expected) = prev.sequence_number().checked_add(1) else {
                return Err(DomainError::invalid_argument(format!(
                    "sequence number {} cannot be followed by another event",
                    prev.sequence_number()
                )));
            };
            if next.sequence_number() != expected {
                return Err(DomainError::invalid_argument(format!(
                    "sequence numbers must be contiguous: {} followed by {}",
                    prev.sequence_number(),
                    next.sequence_number()
                )));
            }
        }

        Ok(Self {
            aggregate_id,
            aggregate_type,
            events: events.into_iter(),
            last_sequence_number: None,
        })
    }

    /// 是否还有未消费的事件（无副作用，可重复调用）
    pub fn has_next(&self) -> bool {
        !self.events.as_slice().is_empty()
    }

    /// 取出下一个事件并前进一位；已耗尽时返回 `DomainError::ExhaustedStream`
    pub fn next_event(&mut self) -> DomainResult<EventEnvelope<E>> {
        match self.events.next() {
            Some(event) => {
                self.last_sequence_number = Some(event.sequence_number());
                Ok(event)
            }
            None => Err(DomainError::ExhaustedStream {
                aggregate_id: self.aggregate_id.clone(),
                last_sequence_number: self.last_sequence_number.unwrap_or_default(),
            }),
        }
    }

    /// 查看下一个事件但不消费
    pub fn peek(&self) -> Option<&EventEnvelope<E>> {
        self.events.as_slice().first()
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// 最近一次取出的事件序号，尚未消费时为 `None`
    pub fn last_sequence_number(&self) -> Option<usize> {
        self.last_sequence_number
    }

    /// 剩余事件数
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl<E> TryFrom<Vec<EventEnvelope<E>>> for DomainEventStream<E> {
    type Error = DomainError;

    fn try_from(events: Vec<EventEnvelope<E>>) -> Result<Self, Self::Error> {
        Self::new(events)
    }
}

impl<E> Iterator for DomainEventStream<E> {
    type Item = EventEnvelope<E>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.events.size_hint()
    }
}

impl<E> FusedIterator for DomainEventStream<E> {}

/// 以内联事件列表创建事件流，等价于 `DomainEventStream::new(vec![...])`
#[macro_export]
macro_rules! event_stream {
    ($($event:expr),+ $(,)?) => {
        $crate::domain_event::DomainEventStream::new(::std::vec![$($event),+])
    };
}
