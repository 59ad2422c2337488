use crate::message::GenericMessage;

/// 应用层命令（Command）
///
/// 表达“意图”的写操作请求，通常会修改领域状态，由命令总线在工作单元内交给唯一的处理器执行。
/// 建议保持语义化的“动宾结构”命名，如 `OpenAccount`、`CloseOrder`。
///
/// 关联常量：
/// - `NAME`：命令的稳定名称，用于日志、追踪与错误信息。避免依赖 `type_name::<T>()`。
pub trait Command: Send + Sync + 'static {
    /// 命令的稳定名称（建议常量字符串，不随重构变化）
    const NAME: &'static str;
}

/// 命令消息：命令载荷 + 标识 + 元数据
pub type CommandMessage<C> = GenericMessage<C>;
