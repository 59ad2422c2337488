use async_trait::async_trait;
use std::sync::Arc;
use uow_application::InMemoryCommandBus;
use uow_application::command::{Command, CommandMessage};
use uow_application::command_bus::CommandBus;
use uow_application::command_handler::CommandHandler;
use uow_application::current_unit_of_work::CurrentUnitOfWork;
use uow_application::error::{AppError, AppResult};
use uow_application::listener::{RollbackCause, UnitOfWorkListener};
use uow_application::message::GenericMessage;
use uow_domain::aggregate::AggregateRoot;
use uow_domain::metadata::MetaData;

struct SendInvoice {
    customer: String,
}

impl Command for SendInvoice {
    const NAME: &'static str = "SendInvoice";
}

/// 打印各阶段通知
struct Printer;

#[async_trait]
impl UnitOfWorkListener for Printer {
    fn listener_name(&self) -> &str {
        "printer"
    }

    async fn on_prepare_commit(&self, aggregates: &[Arc<dyn AggregateRoot>]) -> anyhow::Result<()> {
        println!("prepare commit ({} aggregates)", aggregates.len());
        Ok(())
    }

    async fn after_commit(&self) -> anyhow::Result<()> {
        println!("after commit");
        Ok(())
    }

    async fn on_rollback(&self, cause: Option<&RollbackCause>) -> anyhow::Result<()> {
        println!("rollback: {}", cause.map(ToString::to_string).unwrap_or_default());
        Ok(())
    }
}

struct SendInvoiceHandler;

#[async_trait]
impl CommandHandler<SendInvoice> for SendInvoiceHandler {
    async fn handle(&self, cmd: CommandMessage<SendInvoice>) -> AppResult<()> {
        let uow = CurrentUnitOfWork::get()?;
        uow.register_listener(Arc::new(Printer))?;
        println!(
            "SendInvoice: customer={} correlation={:?}",
            cmd.payload().customer,
            uow.correlation_data()
        );

        if cmd.payload().customer.is_empty() {
            return Err(anyhow::anyhow!("customer required").into());
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = InMemoryCommandBus::new();
    bus.register::<SendInvoice, _>(Arc::new(SendInvoiceHandler))?;

    let msg = GenericMessage::with_metadata(
        SendInvoice {
            customer: "acme".into(),
        },
        MetaData::with_entry("trace_id", "trace-42"),
    );
    bus.dispatch(msg).await?;

    // 处理器失败 -> 工作单元回滚，监听器收到原因
    if let Err(err) = bus
        .send(SendInvoice {
            customer: String::new(),
        })
        .await
    {
        eprintln!("rolled back as expected: {err}");
    }

    // 未注册的命令 -> HandlerNotFound
    struct Unregistered;
    impl Command for Unregistered {
        const NAME: &'static str = "Unregistered";
    }
    if let Err(AppError::HandlerNotFound(name)) = bus.send(Unregistered).await {
        eprintln!("no handler for {name}");
    }
    Ok(())
}
