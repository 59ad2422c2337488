//! 持久化与事件溯源（persist）
//!
//! 定义事件仓储协议及事件的持久化形态，支持：
//! - 事件持久化与按聚合查询（`EventRepository`）；
//! - 读取为有序事件流（`EventRepositoryExt::read_stream`）；
//! - 事件与持久化形态间的序列化/反序列化（`serialize_events`/`deserialize_events`）。
//!
//! 该模块聚焦协议，具体存储后端由上层提供实现并注入。
//!
mod event_repository;
mod serialized_event;

pub use event_repository::{EventRepository, EventRepositoryExt};
pub use serialized_event::{SerializedEvent, deserialize_events, serialize_events};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::{DomainEvent, EventEnvelope};
    use crate::error::DomainError;
    use crate::metadata::MetaData;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum UserEvent {
        Created { name: String },
        Renamed { name: String },
    }

    impl DomainEvent for UserEvent {
        fn event_type(&self) -> &str {
            match self {
                UserEvent::Created { .. } => "UserEvent.Created",
                UserEvent::Renamed { .. } => "UserEvent.Renamed",
            }
        }

        fn event_version(&self) -> usize {
            2
        }
    }

    #[test]
    fn serialize_deserialize_keeps_identity_and_metadata() {
        let env = EventEnvelope::new(
            "u-1",
            "user",
            1,
            UserEvent::Created {
                name: "alice".into(),
            },
        )
        .with_metadata(MetaData::with_entry("correlation_id", "c-1"));

        let ser = serialize_events(&[env.clone()]).unwrap();
        assert_eq!(ser.len(), 1);
        assert_eq!(ser[0].aggregate_id(), "u-1");
        assert_eq!(ser[0].aggregate_type(), "user");
        assert_eq!(ser[0].sequence_number(), 1);
        assert_eq!(ser[0].event_type(), "UserEvent.Created");
        assert_eq!(ser[0].event_version(), 2);
        assert_eq!(ser[0].metadata().get_str("correlation_id"), Some("c-1"));

        let de = deserialize_events::<UserEvent>(&ser).unwrap();
        assert_eq!(de, vec![env]);
    }

    #[test]
    fn deserialize_reports_payload_shape_errors() {
        let raw = SerializedEvent::builder()
            .event_id(ulid::Ulid::new().to_string())
            .event_type("UserEvent.Created".to_string())
            .event_version(1)
            .aggregate_id("u-2".to_string())
            .aggregate_type("user".to_string())
            .sequence_number(1)
            .occurred_at(Utc::now())
            .payload(serde_json::json!({ "Deleted": {} }))
            .build();

        let err = deserialize_events::<UserEvent>(&[raw]).unwrap_err();
        assert!(matches!(err, DomainError::Serde { .. }));
    }

    #[derive(Default)]
    struct MapRepository {
        events: Mutex<HashMap<(String, String), Vec<SerializedEvent>>>,
    }

    #[async_trait::async_trait]
    impl EventRepository for MapRepository {
        async fn get_events(
            &self,
            aggregate_type: &str,
            aggregate_id: &str,
        ) -> crate::error::DomainResult<Vec<SerializedEvent>> {
            let key = (aggregate_type.to_string(), aggregate_id.to_string());
            Ok(self
                .events
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .unwrap_or_default())
        }

        async fn save(&self, events: &[SerializedEvent]) -> crate::error::DomainResult<()> {
            let mut guard = self.events.lock().unwrap();
            for e in events {
                guard
                    .entry((e.aggregate_type().to_string(), e.aggregate_id().to_string()))
                    .or_default()
                    .push(e.clone());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn read_stream_returns_ordered_stream_or_not_found() {
        let repo = MapRepository::default();

        let err = repo
            .read_stream::<UserEvent>("user", "u-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        let envelopes = vec![
            EventEnvelope::new("u-1", "user", 1, UserEvent::Created { name: "a".into() }),
            EventEnvelope::new("u-1", "user", 2, UserEvent::Renamed { name: "b".into() }),
        ];
        repo.save(&serialize_events(&envelopes).unwrap())
            .await
            .unwrap();

        let mut stream = repo.read_stream::<UserEvent>("user", "u-1").await.unwrap();
        assert_eq!(stream.aggregate_id(), "u-1");
        assert_eq!(stream.next_event().unwrap().sequence_number(), 1);
        assert_eq!(stream.next_event().unwrap().sequence_number(), 2);
        assert!(!stream.has_next());
    }
}
