use uow_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    // --- 工作单元 ---
    #[error("no unit of work is active in the current execution context")]
    NoActiveUnitOfWork,

    #[error("illegal state: {reason}")]
    IllegalState { reason: String },

    /// 准备提交阶段被监听器否决，工作单元已回滚
    #[error("prepare commit rejected by listener {listener}: {source}")]
    PrepareCommit {
        listener: String,
        #[source]
        source: anyhow::Error,
    },

    /// 保存聚合或发布事件失败，工作单元已回滚
    #[error("commit failed: {source}")]
    Commit {
        #[source]
        source: anyhow::Error,
    },

    /// 已提交，但提交后通知失败；`compensated` 表示是否额外触发了回滚通知
    #[error("listener {listener} failed after commit (compensated={compensated}): {source}")]
    PostCommit {
        listener: String,
        compensated: bool,
        #[source]
        source: anyhow::Error,
    },

    #[error("rollback listener {listener} failed: {source}")]
    Rollback {
        listener: String,
        #[source]
        source: anyhow::Error,
    },

    // --- 命令分发 ---
    #[error("handler not found: {0}")]
    HandlerNotFound(&'static str),

    #[error("handler already registered: command={command}")]
    AlreadyRegisteredCommand { command: &'static str },

    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("aggregate not found: {0}")]
    AggregateNotFound(String),

    #[error("handler: {0}")]
    Handler(#[from] anyhow::Error),
}

impl AppError {
    pub fn illegal_state(reason: impl Into<String>) -> Self {
        AppError::IllegalState {
            reason: reason.into(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
