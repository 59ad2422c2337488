use crate::{
    command::{Command, CommandMessage},
    command_bus::CommandBus,
    command_handler::CommandHandler,
    correlation::{CorrelationDataProvider, MessageOriginProvider},
    error::{AppError, AppResult},
    unit_of_work::{UnitOfWork, UnitOfWorkConfig},
};
use async_trait::async_trait;
use bon::Builder;
use dashmap::{DashMap, mapref::entry::Entry};
use std::any::{Any, TypeId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;
use uow_domain::metadata::MetaData;

type CmdHandlerFuture = Pin<Box<dyn Future<Output = AppResult<()>> + Send>>;

type CmdHandlerFn = Arc<dyn Fn(Box<dyn Any + Send>) -> CmdHandlerFuture + Send + Sync>;

#[derive(Clone)]
struct HandlerEntry {
    command: &'static str,
    call: CmdHandlerFn,
}

fn default_providers() -> Vec<Arc<dyn CorrelationDataProvider>> {
    vec![Arc::new(MessageOriginProvider)]
}

/// 基于内存的 CommandBus 实现
/// - 通过 TypeId 注册不同 Command 对应的 Handler，每种命令只允许一个处理器
/// - 运行时以类型擦除（Any）方式进行调度
/// - 每次分发都在新的工作单元内执行处理器，关联数据来自 `correlation_data_providers`
#[derive(Builder)]
pub struct InMemoryCommandBus {
    #[builder(skip)]
    handlers: DashMap<TypeId, HandlerEntry>,
    #[builder(default = default_providers())]
    correlation_data_providers: Vec<Arc<dyn CorrelationDataProvider>>,
    #[builder(default)]
    unit_of_work_config: UnitOfWorkConfig,
}

impl Default for InMemoryCommandBus {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl InMemoryCommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册命令处理器；同一命令重复注册返回 `AlreadyRegisteredCommand`
    pub fn register<C, H>(&self, handler: Arc<H>) -> AppResult<()>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let call: CmdHandlerFn = Arc::new(move |boxed_cmd| {
            let handler = handler.clone();

            Box::pin(async move {
                match boxed_cmd.downcast::<CommandMessage<C>>() {
                    Ok(cmd) => handler.handle(*cmd).await,
                    Err(_) => Err(AppError::TypeMismatch {
                        expected: C::NAME,
                        found: "unknown",
                    }),
                }
            })
        });

        match self.handlers.entry(TypeId::of::<C>()) {
            Entry::Occupied(_) => Err(AppError::AlreadyRegisteredCommand { command: C::NAME }),
            Entry::Vacant(slot) => {
                slot.insert(HandlerEntry {
                    command: C::NAME,
                    call,
                });
                Ok(())
            }
        }
    }

    /// 已注册的命令名称（按名称排序）
    pub fn registered_commands(&self) -> Vec<&'static str> {
        let mut names = self
            .handlers
            .iter()
            .map(|entry| entry.value().command)
            .collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    fn correlation_data_for<C: Command>(&self, cmd: &CommandMessage<C>) -> MetaData {
        self.correlation_data_providers
            .iter()
            .fold(MetaData::empty(), |acc, provider| {
                acc.merged_with(&provider.correlation_data_for(cmd))
            })
    }
}

#[async_trait]
impl CommandBus for InMemoryCommandBus {
    async fn dispatch<C: Command>(&self, cmd: CommandMessage<C>) -> AppResult<()> {
        let Some(entry) = self.handlers.get(&TypeId::of::<C>()).map(|h| h.clone()) else {
            return Err(AppError::HandlerNotFound(C::NAME));
        };

        let correlation_data = self.correlation_data_for(&cmd);
        let config = self.unit_of_work_config.clone();
        debug!(command = entry.command, message_id = %cmd.identifier(), "dispatching command");

        let uow = UnitOfWork::builder()
            .correlation_data(correlation_data)
            .config(config)
            .build();
        uow.execute((entry.call)(Box::new(cmd))).await
    }
}
