use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;
use uow_domain::error::{DomainError, DomainResult};
use uow_domain::persist::{EventRepository, SerializedEvent};

/// 基于内存的事件仓储
/// - 以 (聚合类型, 聚合 ID) 为键保存事件历史
/// - 追加时要求序号紧接已有历史，否则返回 `VersionConflict`
#[derive(Default)]
pub struct InMemoryEventRepository {
    streams: DashMap<(String, String), Vec<SerializedEvent>>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全部聚合的事件总数
    pub fn len(&self) -> usize {
        self.streams.iter().map(|s| s.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> DomainResult<Vec<SerializedEvent>> {
        let key = (aggregate_type.to_string(), aggregate_id.to_string());
        Ok(self
            .streams
            .get(&key)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }

    async fn save(&self, events: &[SerializedEvent]) -> DomainResult<()> {
        let batches = group_by_stream(events);

        // 先整体校验，任何冲突都不留下部分写入
        for (key, batch) in &batches {
            let current = self.streams.get(key).map(|s| s.len()).unwrap_or(0);
            check_contiguous(current, batch)?;
        }

        for (key, batch) in batches {
            let mut stream = self.streams.entry(key).or_default();
            check_contiguous(stream.len(), &batch)?;
            stream.extend(batch.into_iter().cloned());
        }

        trace!(count = events.len(), "events appended");
        Ok(())
    }
}

type StreamKey = (String, String);

/// 按聚合分组，保持组内顺序
fn group_by_stream(events: &[SerializedEvent]) -> Vec<(StreamKey, Vec<&SerializedEvent>)> {
    let mut batches: Vec<(StreamKey, Vec<&SerializedEvent>)> = Vec::new();
    for event in events {
        let key = (
            event.aggregate_type().to_string(),
            event.aggregate_id().to_string(),
        );
        match batches.iter_mut().find(|(k, _)| *k == key) {
            Some((_, batch)) => batch.push(event),
            None => batches.push((key, vec![event])),
        }
    }
    batches
}

fn check_contiguous(current: usize, batch: &[&SerializedEvent]) -> DomainResult<()> {
    for (offset, event) in batch.iter().enumerate() {
        let expected = current + offset + 1;
        if event.sequence_number() != expected {
            return Err(DomainError::VersionConflict {
                expected,
                actual: event.sequence_number(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::InMemoryEventRepository;
    use chrono::Utc;
    use serde_json::json;
    use uow_domain::error::DomainError;
    use uow_domain::persist::{EventRepository, SerializedEvent};

    fn event(aggregate_id: &str, sequence_number: usize) -> SerializedEvent {
        SerializedEvent::builder()
            .event_id(format!("{aggregate_id}-{sequence_number}"))
            .event_type("account.changed".to_string())
            .event_version(1)
            .aggregate_id(aggregate_id.to_string())
            .aggregate_type("account".to_string())
            .sequence_number(sequence_number)
            .occurred_at(Utc::now())
            .payload(json!({ "n": sequence_number }))
            .build()
    }

    #[tokio::test]
    async fn appends_contiguous_history_per_aggregate() {
        let repo = InMemoryEventRepository::new();
        repo.save(&[event("a-1", 1), event("a-2", 1), event("a-1", 2)])
            .await
            .unwrap();
        repo.save(&[event("a-1", 3)]).await.unwrap();

        let history = repo.get_events("account", "a-1").await.unwrap();
        let numbers: Vec<_> = history.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(repo.len(), 4);
        assert!(repo.get_events("account", "missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conflicting_batch_stores_nothing() {
        let repo = InMemoryEventRepository::new();

        let err = repo.save(&[event("a-1", 1), event("a-1", 3)]).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::VersionConflict {
                expected: 2,
                actual: 3
            }
        ));
        assert!(repo.is_empty());

        // 另一个聚合的冲突同样不会留下本批次中已校验通过的事件
        repo.save(&[event("a-1", 1)]).await.unwrap();
        let err = repo.save(&[event("a-2", 1), event("a-1", 1)]).await;
        assert!(matches!(err, Err(DomainError::VersionConflict { .. })));
        assert_eq!(repo.len(), 1);
        assert!(repo.get_events("account", "a-2").await.unwrap().is_empty());
    }
}
