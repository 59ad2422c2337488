//! 事件溯源仓储（EventSourcingRepository）
//!
//! - `load`：读取聚合历史并通过 `Aggregate::replay` 重建；
//! - `save`：为新事件编号、附加关联数据并应用到聚合，
//!   然后把聚合登记到当前工作单元，事件在提交时才真正追加到事件仓储并发布。
//!
use crate::current_unit_of_work::CurrentUnitOfWork;
use crate::error::{AppError, AppResult};
use crate::listener::SaveAggregateCallback;
use crate::message::correlated;
use async_trait::async_trait;
use bon::bon;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;
use uow_domain::aggregate::{Aggregate, AggregateRoot};
use uow_domain::domain_event::EventEnvelope;
use uow_domain::entity::Entity;
use uow_domain::error::DomainError;
use uow_domain::eventing::EventBus;
use uow_domain::metadata::MetaData;
use uow_domain::persist::{EventRepository, EventRepositoryExt, SerializedEvent, serialize_events};

pub struct EventSourcingRepository<A, R> {
    event_repository: Arc<R>,
    event_bus: Option<Arc<dyn EventBus>>,
    _aggregate: PhantomData<fn() -> A>,
}

#[bon]
impl<A, R> EventSourcingRepository<A, R>
where
    A: Aggregate,
    R: EventRepository + 'static,
{
    #[builder]
    pub fn new(event_repository: Arc<R>, event_bus: Option<Arc<dyn EventBus>>) -> Self {
        Self {
            event_repository,
            event_bus,
            _aggregate: PhantomData,
        }
    }
}

impl<A, R> EventSourcingRepository<A, R>
where
    A: Aggregate,
    R: EventRepository + 'static,
{
    /// 重放历史重建聚合；没有任何历史时返回 `AggregateNotFound`
    pub async fn load(&self, id: &A::Id) -> AppResult<A> {
        let aggregate_id = id.to_string();

        let mut stream = match self
            .event_repository
            .read_stream::<A::Event>(A::TYPE, &aggregate_id)
            .await
        {
            Ok(stream) => stream,
            Err(DomainError::NotFound { .. }) => {
                return Err(AppError::AggregateNotFound(format!(
                    "{}/{aggregate_id}",
                    A::TYPE
                )));
            }
            Err(err) => return Err(err.into()),
        };

        Ok(A::replay(&mut stream)?)
    }

    /// 把 `events` 应用到聚合并登记到当前工作单元。
    ///
    /// 事件序号从聚合当前版本之后连续编号，元数据为当前关联数据。
    /// 同一工作单元内同一聚合只能保存一次。
    pub fn save(&self, mut aggregate: A, events: Vec<A::Event>) -> AppResult<Arc<A>> {
        let uow = CurrentUnitOfWork::get()?;

        let aggregate_id = aggregate.id().to_string();
        let base_version = aggregate.version();
        let metadata = correlated(MetaData::empty());

        let envelopes = events
            .into_iter()
            .enumerate()
            .map(|(offset, payload)| {
                EventEnvelope::new(
                    aggregate_id.as_str(),
                    A::TYPE,
                    base_version + offset + 1,
                    payload,
                )
                .with_metadata(metadata.clone())
            })
            .collect::<Vec<_>>();

        for envelope in &envelopes {
            aggregate.apply(envelope);
        }
        let serialized = serialize_events(&envelopes)?;

        let aggregate = Arc::new(aggregate);
        let callback = Arc::new(AppendEvents {
            event_repository: Arc::clone(&self.event_repository),
            events: serialized.clone(),
        });
        let registered =
            uow.register_aggregate(Arc::clone(&aggregate) as Arc<dyn AggregateRoot>, callback)?;
        if !same_instance(&registered, &aggregate) {
            return Err(AppError::illegal_state(format!(
                "aggregate {}/{aggregate_id} already has pending changes in this unit of work",
                A::TYPE
            )));
        }

        if let Some(bus) = &self.event_bus {
            for event in serialized {
                uow.publish_event(event, Arc::clone(bus))?;
            }
        }

        debug!(
            uow_id = %uow.id(),
            aggregate_type = A::TYPE,
            aggregate_id = %aggregate_id,
            events = envelopes.len(),
            "aggregate changes registered"
        );
        Ok(aggregate)
    }
}

fn same_instance<A: Aggregate>(registered: &Arc<dyn AggregateRoot>, aggregate: &Arc<A>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(registered), Arc::as_ptr(aggregate))
}

/// 提交时把本次产生的事件追加到事件仓储
struct AppendEvents<R> {
    event_repository: Arc<R>,
    events: Vec<SerializedEvent>,
}

#[async_trait]
impl<R> SaveAggregateCallback for AppendEvents<R>
where
    R: EventRepository + 'static,
{
    async fn save(&self, _aggregate: &dyn AggregateRoot) -> anyhow::Result<()> {
        if self.events.is_empty() {
            return Ok(());
        }
        self.event_repository.save(&self.events).await?;
        Ok(())
    }
}
