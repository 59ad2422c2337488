//! 工作单元监听器（UnitOfWorkListener）与聚合保存回调
//!
//! 监听器是被动观察者，在工作单元的各生命周期阶段被依次通知：
//! - `on_prepare_commit`：聚合保存、事件发布之前，可用于校验并否决提交；
//! - `after_commit`：已提交之后；
//! - `on_rollback`：回滚时（准备提交失败时也会被调用）。
//!
//! 每个回调都有空实现，只需覆写关心的阶段。
//!
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;
use uow_domain::aggregate::AggregateRoot;

/// 回滚原因
pub type RollbackCause = dyn Error + Send + Sync + 'static;

#[async_trait]
pub trait UnitOfWorkListener: Send + Sync {
    /// 监听器名称（用于错误信息与日志）
    fn listener_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// 聚合提交之前被调用；返回错误将使工作单元回滚
    async fn on_prepare_commit(
        &self,
        _aggregates: &[Arc<dyn AggregateRoot>],
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// 工作单元提交之后被调用
    async fn after_commit(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// 工作单元回滚时被调用
    async fn on_rollback(&self, _cause: Option<&RollbackCause>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 聚合保存回调：在提交阶段由工作单元对每个已登记的聚合调用一次
#[async_trait]
pub trait SaveAggregateCallback: Send + Sync {
    async fn save(&self, aggregate: &dyn AggregateRoot) -> anyhow::Result<()>;
}

/// 无需持久化的聚合（例如只读参与者）
pub struct NoopSaveCallback;

#[async_trait]
impl SaveAggregateCallback for NoopSaveCallback {
    async fn save(&self, _aggregate: &dyn AggregateRoot) -> anyhow::Result<()> {
        Ok(())
    }
}
