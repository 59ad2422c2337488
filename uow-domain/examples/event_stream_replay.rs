use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use uow_domain::aggregate::Aggregate;
use uow_domain::domain_event::{DomainEvent, DomainEventStream, EventEnvelope};
use uow_domain::entity::Entity;
use uow_domain::eventing::{EventBus, InMemoryEventBus};
use uow_domain::persist::{deserialize_events, serialize_events};

#[derive(Debug, Default)]
struct Thermostat {
    id: String,
    version: usize,
    target: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum ThermostatEvent {
    TargetSet { celsius: f32 },
}

impl DomainEvent for ThermostatEvent {
    fn event_type(&self) -> &str {
        "ThermostatEvent.TargetSet"
    }
}

impl Entity for Thermostat {
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

impl Aggregate for Thermostat {
    const TYPE: &'static str = "thermostat";
    type Event = ThermostatEvent;

    fn apply(&mut self, event: &EventEnvelope<Self::Event>) {
        let ThermostatEvent::TargetSet { celsius } = event.payload();
        self.target = *celsius;
        self.version = event.sequence_number();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = InMemoryEventBus::new(8);
    let mut sub = bus.subscribe().await;

    let history = [19.5, 21.0, 20.0]
        .into_iter()
        .enumerate()
        .map(|(i, celsius)| {
            EventEnvelope::new(
                "t-1",
                Thermostat::TYPE,
                i + 1,
                ThermostatEvent::TargetSet { celsius },
            )
        })
        .collect::<Vec<_>>();
    bus.publish_batch(&serialize_events(&history)?).await?;

    let mut received = Vec::new();
    while received.len() < history.len() {
        match sub.next().await {
            Some(event) => received.push(event?),
            None => break,
        }
    }

    let mut stream = DomainEventStream::new(deserialize_events::<ThermostatEvent>(&received)?)?;
    let thermostat = Thermostat::replay(&mut stream)?;
    println!(
        "thermostat {} at version {} targets {}°C",
        thermostat.id, thermostat.version, thermostat.target
    );
    Ok(())
}
