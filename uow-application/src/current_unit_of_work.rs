//! 当前工作单元（CurrentUnitOfWork）
//!
//! 每个执行上下文各自持有一个工作单元栈，栈顶即“当前”工作单元，
//! 使运行在工作单元内部的代码无需显式传参即可取得它（例如附加关联数据）。
//!
//! 执行上下文的划分：
//! - 在 `CurrentUnitOfWork::scope` 内运行的异步任务使用任务本地栈（`tokio::task_local!`），
//!   不受任务在线程间迁移的影响；
//! - 其余情况使用线程本地栈。
//!
//! 不同上下文之间互不可见，因此栈操作无需加锁。
//!
use crate::error::{AppError, AppResult};
use crate::unit_of_work::UnitOfWork;
use std::cell::RefCell;
use std::future::Future;
use uow_domain::metadata::MetaData;

tokio::task_local! {
    static TASK_STACK: RefCell<Vec<UnitOfWork>>;
}

thread_local! {
    static THREAD_STACK: RefCell<Vec<UnitOfWork>> = const { RefCell::new(Vec::new()) };
}

/// 访问当前执行上下文的工作单元栈（闭包内不得回调外部代码）
fn with_stack<R>(f: impl FnOnce(&mut Vec<UnitOfWork>) -> R) -> R {
    if CurrentUnitOfWork::in_task_scope() {
        TASK_STACK.with(|stack| f(&mut stack.borrow_mut()))
    } else {
        THREAD_STACK.with(|stack| f(&mut stack.borrow_mut()))
    }
}

/// 当前执行上下文的工作单元栈
pub struct CurrentUnitOfWork;

impl CurrentUnitOfWork {
    /// 当前上下文是否存在活动的工作单元
    pub fn is_started() -> bool {
        with_stack(|stack| !stack.is_empty())
    }

    /// 返回栈顶工作单元；栈为空时返回 `NoActiveUnitOfWork`
    pub fn get() -> AppResult<UnitOfWork> {
        Self::try_get().ok_or(AppError::NoActiveUnitOfWork)
    }

    pub fn try_get() -> Option<UnitOfWork> {
        with_stack(|stack| stack.last().cloned())
    }

    /// 将工作单元压栈，成为当前工作单元
    pub fn set(uow: &UnitOfWork) {
        with_stack(|stack| stack.push(uow.clone()));
    }

    /// 仅当 `uow` 为栈顶时出栈；否则返回 `IllegalState` 且栈保持不变
    pub fn clear(uow: &UnitOfWork) -> AppResult<()> {
        with_stack(|stack| match stack.last() {
            Some(top) if top == uow => {
                stack.pop();
                Ok(())
            }
            _ => Err(AppError::illegal_state(
                "attempted to clear a unit of work that is not the current one",
            )),
        })
    }

    /// 栈顶工作单元的关联数据；无活动工作单元时为空
    pub fn correlation_data() -> MetaData {
        Self::try_get()
            .map(|uow| uow.correlation_data())
            .unwrap_or_default()
    }

    /// 栈深度
    pub fn depth() -> usize {
        with_stack(|stack| stack.len())
    }

    pub(crate) fn at(index: usize) -> Option<UnitOfWork> {
        with_stack(|stack| stack.get(index).cloned())
    }

    pub(crate) fn contains(uow: &UnitOfWork) -> bool {
        with_stack(|stack| stack.iter().any(|u| u == uow))
    }

    /// 是否运行在任务本地栈的作用域内
    pub fn in_task_scope() -> bool {
        TASK_STACK.try_with(|_| ()).is_ok()
    }

    /// 以全新的任务本地栈运行 `fut`
    pub async fn scope<F: Future>(fut: F) -> F::Output {
        TASK_STACK.scope(RefCell::new(Vec::new()), fut).await
    }

    /// 已处于任务本地作用域时直接运行 `fut`（沿用外层栈），否则建立新的作用域
    pub async fn within_scope<F: Future>(fut: F) -> F::Output {
        if Self::in_task_scope() {
            fut.await
        } else {
            Self::scope(fut).await
        }
    }

    /// 以全新的任务本地栈同步运行 `f`
    pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
        TASK_STACK.sync_scope(RefCell::new(Vec::new()), f)
    }
}
