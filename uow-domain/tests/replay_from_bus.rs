use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use uow_domain::aggregate::Aggregate;
use uow_domain::domain_event::{DomainEvent, DomainEventStream, EventEnvelope};
use uow_domain::entity::Entity;
use uow_domain::error::DomainError;
use uow_domain::eventing::{EventBus, InMemoryEventBus};
use uow_domain::metadata::MetaData;
use uow_domain::persist::{deserialize_events, serialize_events};

#[derive(Debug, Default)]
struct Cart {
    id: String,
    version: usize,
    items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum CartEvent {
    ItemAdded { sku: String },
    ItemRemoved { sku: String },
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &str {
        match self {
            CartEvent::ItemAdded { .. } => "CartEvent.ItemAdded",
            CartEvent::ItemRemoved { .. } => "CartEvent.ItemRemoved",
        }
    }
}

impl Entity for Cart {
    type Id = String;

    fn new(aggregate_id: Self::Id) -> Self {
        Self {
            id: aggregate_id,
            ..Default::default()
        }
    }

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> usize {
        self.version
    }
}

impl Aggregate for Cart {
    const TYPE: &'static str = "cart";
    type Event = CartEvent;

    fn apply(&mut self, event: &EventEnvelope<Self::Event>) {
        match event.payload() {
            CartEvent::ItemAdded { sku } => self.items.push(sku.clone()),
            CartEvent::ItemRemoved { sku } => self.items.retain(|s| s != sku),
        }
        self.version = event.sequence_number();
    }
}

fn added(seq: usize, sku: &str) -> EventEnvelope<CartEvent> {
    EventEnvelope::new("cart-1", Cart::TYPE, seq, CartEvent::ItemAdded { sku: sku.into() })
        .with_metadata(MetaData::with_entry("trace_id", "t-1"))
}

#[tokio::test]
async fn subscriber_rebuilds_aggregate_from_published_events() {
    let bus = InMemoryEventBus::new(16);
    let mut sub = bus.subscribe().await;

    let history = vec![
        added(1, "apple"),
        added(2, "pear"),
        EventEnvelope::new(
            "cart-1",
            Cart::TYPE,
            3,
            CartEvent::ItemRemoved {
                sku: "apple".into(),
            },
        ),
    ];
    bus.publish_batch(&serialize_events(&history).unwrap())
        .await
        .unwrap();

    let mut received = Vec::new();
    for _ in 0..history.len() {
        received.push(sub.next().await.unwrap().unwrap());
    }
    assert_eq!(received[0].metadata().get_str("trace_id"), Some("t-1"));

    let mut stream = DomainEventStream::new(deserialize_events::<CartEvent>(&received).unwrap())
        .unwrap();
    let cart = Cart::replay(&mut stream).unwrap();

    assert_eq!(cart.items, vec!["pear".to_string()]);
    assert_eq!(cart.version, 3);
    assert!(matches!(
        stream.next_event(),
        Err(DomainError::ExhaustedStream { last_sequence_number: 3, .. })
    ));
}

#[test]
fn gaps_in_history_are_rejected_before_replay() {
    let err = DomainEventStream::new(vec![added(1, "apple"), added(3, "pear")]).unwrap_err();
    assert!(matches!(err, DomainError::InvalidArgument { .. }));
}
