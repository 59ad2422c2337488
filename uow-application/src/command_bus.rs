use crate::{
    command::{Command, CommandMessage},
    error::AppResult,
    message::GenericMessage,
};
use async_trait::async_trait;

/// 命令总线（Command Bus）
///
/// - 负责根据命令的具体类型路由到对应的处理器；
/// - 每次分发都在一个新的工作单元内执行处理器（已有工作单元时作为其嵌套单元）；
/// - 该 trait 带有泛型方法，通常以具体实现类型注入使用。
#[async_trait]
pub trait CommandBus: Send + Sync {
    /// 分发命令消息到对应处理器
    async fn dispatch<C: Command>(&self, cmd: CommandMessage<C>) -> AppResult<()>;

    /// 将命令包装为消息（附带当前关联数据）后分发
    async fn send<C: Command>(&self, cmd: C) -> AppResult<()> {
        self.dispatch(GenericMessage::new(cmd)).await
    }
}
