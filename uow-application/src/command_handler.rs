use crate::{command::Command, command::CommandMessage, error::AppResult};
use async_trait::async_trait;

/// 命令处理器
///
/// 在命令总线开启的工作单元内被调用，可通过 `CurrentUnitOfWork::get()` 取得该工作单元。
/// 返回错误时工作单元以该错误为原因回滚。
#[async_trait]
pub trait CommandHandler<C>: Send + Sync
where
    C: Command,
{
    async fn handle(&self, cmd: CommandMessage<C>) -> AppResult<()>;
}
