//! 工作单元（UnitOfWork）
//!
//! 表示一次逻辑操作（处理一条命令或事件）的生命周期：
//! - `start`：记录关联数据（外层工作单元的关联数据 + 本单元追加项，本单元优先）并压栈；
//! - `commit`：准备提交 → 保存聚合、发布暂存事件 → 已提交，依次通知监听器；
//! - `rollback`：回滚并通知监听器；
//! - 无论结果如何，结束时恰好出栈一次。
//!
//! 状态机：`Active` → `PreparingCommit` → `Committed`，
//! 或 `Active`/`PreparingCommit` → `RolledBack`。
//!
//! 工作单元只应在一个执行上下文中使用；内部互斥锁仅用于在调用方与上下文栈之间共享句柄，
//! 从不跨越 `.await` 或监听器调用持有。
//!
use crate::current_unit_of_work::CurrentUnitOfWork;
use crate::error::{AppError, AppResult};
use crate::listener::{RollbackCause, SaveAggregateCallback, UnitOfWorkListener};
use anyhow::Context;
use bon::bon;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};
use uow_domain::aggregate::AggregateRoot;
use uow_domain::eventing::EventBus;
use uow_domain::metadata::MetaData;
use uow_domain::persist::SerializedEvent;
use uuid::Uuid;

/// 工作单元生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOfWorkStatus {
    Active,
    PreparingCommit,
    Committed,
    RolledBack,
}

impl UnitOfWorkStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

impl fmt::Display for UnitOfWorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::PreparingCommit => "preparing commit",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        };
        f.write_str(s)
    }
}

/// 提交后通知失败时的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostCommitPolicy {
    /// 仅将失败以 `AppError::PostCommit { compensated: false, .. }` 返回
    #[default]
    Surface,
    /// 额外调用所有监听器的 `on_rollback` 作为补偿通知，
    /// 返回 `AppError::PostCommit { compensated: true, .. }`
    Compensate,
}

#[derive(Debug, Clone, Default)]
pub struct UnitOfWorkConfig {
    pub post_commit_policy: PostCommitPolicy,
}

type ListenerFailure = (String, anyhow::Error);

struct RegisteredAggregate {
    aggregate: Arc<dyn AggregateRoot>,
    callback: Arc<dyn SaveAggregateCallback>,
}

struct StagedEvent {
    bus: Arc<dyn EventBus>,
    event: SerializedEvent,
}

struct State {
    status: UnitOfWorkStatus,
    started: bool,
    concluded: bool,
    /// 外层工作单元在上下文栈中的下标
    parent_index: Option<usize>,
    correlation_data: MetaData,
    aggregates: Vec<RegisteredAggregate>,
    listeners: Vec<Arc<dyn UnitOfWorkListener>>,
    staged_events: Vec<StagedEvent>,
}

struct Inner {
    id: Uuid,
    config: UnitOfWorkConfig,
    own_correlation_data: MetaData,
    state: Mutex<State>,
}

/// 工作单元句柄，克隆后指向同一个工作单元
#[derive(Clone)]
pub struct UnitOfWork {
    inner: Arc<Inner>,
}

#[bon]
impl UnitOfWork {
    /// 创建尚未启动的工作单元；`correlation_data` 为本单元追加的关联数据
    #[builder]
    pub fn new(
        #[builder(default)] correlation_data: MetaData,
        #[builder(default)] config: UnitOfWorkConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                config,
                own_correlation_data: correlation_data.clone(),
                state: Mutex::new(State {
                    status: UnitOfWorkStatus::Active,
                    started: false,
                    concluded: false,
                    parent_index: None,
                    correlation_data,
                    aggregates: Vec::new(),
                    listeners: Vec::new(),
                    staged_events: Vec::new(),
                }),
            }),
        }
    }
}

impl UnitOfWork {
    /// 创建并启动一个默认配置的工作单元
    pub fn start_new() -> AppResult<Self> {
        let uow = Self::builder().build();
        uow.start()?;
        Ok(uow)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &UnitOfWorkConfig {
        &self.inner.config
    }

    pub fn status(&self) -> UnitOfWorkStatus {
        self.lock().status
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    /// 已启动且尚未结束
    pub fn is_active(&self) -> bool {
        let state = self.lock();
        state.started && !state.concluded && !state.status.is_terminal()
    }

    /// 关联数据快照，在工作单元存续期间保持不变
    pub fn correlation_data(&self) -> MetaData {
        self.lock().correlation_data.clone()
    }

    /// 外层工作单元（经由上下文栈下标查找）
    pub fn parent(&self) -> Option<UnitOfWork> {
        let index = self.lock().parent_index?;
        CurrentUnitOfWork::at(index)
    }

    pub fn is_root(&self) -> bool {
        self.lock().parent_index.is_none()
    }

    /// 已登记的聚合（登记顺序）
    pub fn aggregates(&self) -> Vec<Arc<dyn AggregateRoot>> {
        self.lock()
            .aggregates
            .iter()
            .map(|r| Arc::clone(&r.aggregate))
            .collect()
    }

    /// 启动工作单元并压入当前上下文栈；重复启动返回 `IllegalState`
    ///
    /// 在异步运行时中，直接调用 `start` 必须位于 `CurrentUnitOfWork::scope` 内，
    /// 否则压入的是线程本地栈，会与同一线程上的其它任务共享。优先使用 `execute`。
    pub fn start(&self) -> AppResult<()> {
        let parent = CurrentUnitOfWork::try_get();
        let parent_correlation = parent.as_ref().map(UnitOfWork::correlation_data);
        let parent_index = parent.map(|_| CurrentUnitOfWork::depth() - 1);

        {
            let mut state = self.lock();
            if state.started {
                return Err(AppError::illegal_state(format!(
                    "unit of work {} has already been started",
                    self.id()
                )));
            }
            state.started = true;
            state.parent_index = parent_index;
            state.correlation_data = parent_correlation
                .unwrap_or_default()
                .merged_with(&self.inner.own_correlation_data);
        }

        CurrentUnitOfWork::set(self);
        debug!(uow_id = %self.id(), nested = parent_index.is_some(), "unit of work started");
        Ok(())
    }

    /// 登记监听器；仅在 `Active`/`PreparingCommit` 状态下允许
    pub fn register_listener(&self, listener: Arc<dyn UnitOfWorkListener>) -> AppResult<()> {
        let mut state = self.lock();
        Self::ensure_open(&state, "register a listener on")?;
        state.listeners.push(listener);
        Ok(())
    }

    /// 登记参与的聚合及其保存回调。
    ///
    /// 同一聚合（类型 + 标识）只登记一次：重复登记返回已登记的实例，新的回调被忽略。
    pub fn register_aggregate(
        &self,
        aggregate: Arc<dyn AggregateRoot>,
        callback: Arc<dyn SaveAggregateCallback>,
    ) -> AppResult<Arc<dyn AggregateRoot>> {
        let mut state = self.lock();
        Self::ensure_open(&state, "register an aggregate on")?;

        if let Some(existing) = state
            .aggregates
            .iter()
            .find(|r| r.aggregate.same_identity(aggregate.as_ref()))
        {
            debug!(
                uow_id = %self.id(),
                aggregate_type = aggregate.aggregate_type(),
                aggregate_id = %aggregate.aggregate_id(),
                "aggregate already registered"
            );
            return Ok(Arc::clone(&existing.aggregate));
        }

        state.aggregates.push(RegisteredAggregate {
            aggregate: Arc::clone(&aggregate),
            callback,
        });
        Ok(aggregate)
    }

    /// 暂存一条待发布事件；在提交阶段（聚合保存之后）按暂存顺序发布，回滚时丢弃
    pub fn publish_event(&self, event: SerializedEvent, bus: Arc<dyn EventBus>) -> AppResult<()> {
        let mut state = self.lock();
        Self::ensure_open(&state, "publish an event on")?;
        state.staged_events.push(StagedEvent { bus, event });
        Ok(())
    }

    /// 提交工作单元。
    ///
    /// 仅允许在 `Active` 且为当前工作单元时调用：
    /// 1. 按登记顺序调用 `on_prepare_commit`，任一失败则回滚并返回 `PrepareCommit`；
    /// 2. 保存已登记聚合、发布暂存事件，失败则回滚并返回 `Commit`；
    /// 3. 进入 `Committed`，按登记顺序调用 `after_commit`；失败按 `PostCommitPolicy` 处理，
    ///    返回 `PostCommit`，状态保持 `Committed`。
    pub async fn commit(&self) -> AppResult<()> {
        self.ensure_can_conclude("commit", &[UnitOfWorkStatus::Active])?;
        self.set_status(UnitOfWorkStatus::PreparingCommit);
        debug!(uow_id = %self.id(), "preparing commit");

        let aggregates = self.aggregates();
        let prepared = self.notify_prepare_commit(&aggregates).await;
        if self.status() != UnitOfWorkStatus::PreparingCommit {
            return Err(AppError::illegal_state(format!(
                "unit of work {} was rolled back while preparing commit",
                self.id()
            )));
        }
        if let Err((listener, source)) = prepared {
            self.roll_back_after_failure(&*source).await;
            return self.release(Err(AppError::PrepareCommit { listener, source }));
        }

        if let Err(source) = self.save_aggregates_and_publish().await {
            self.roll_back_after_failure(&*source).await;
            return self.release(Err(AppError::Commit { source }));
        }

        self.set_status(UnitOfWorkStatus::Committed);
        debug!(uow_id = %self.id(), "unit of work committed");

        let result = match self.notify_after_commit().await {
            None => Ok(()),
            Some((listener, source)) => {
                let compensated = match self.inner.config.post_commit_policy {
                    PostCommitPolicy::Surface => false,
                    PostCommitPolicy::Compensate => {
                        if let Some((name, err)) = self.notify_rollback(Some(&*source)).await {
                            warn!(
                                uow_id = %self.id(),
                                listener = %name,
                                error = %err,
                                "compensating rollback listener failed"
                            );
                        }
                        true
                    }
                };
                Err(AppError::PostCommit {
                    listener,
                    compensated,
                    source,
                })
            }
        };

        self.release(result)
    }

    /// 回滚工作单元；允许在 `Active`/`PreparingCommit` 且为当前工作单元时调用。
    ///
    /// 所有监听器都会收到 `on_rollback`，第一个失败以 `AppError::Rollback` 返回。
    pub async fn rollback(&self, cause: Option<&RollbackCause>) -> AppResult<()> {
        self.ensure_can_conclude(
            "roll back",
            &[UnitOfWorkStatus::Active, UnitOfWorkStatus::PreparingCommit],
        )?;
        self.set_status(UnitOfWorkStatus::RolledBack);
        debug!(uow_id = %self.id(), cause = ?cause.map(ToString::to_string), "rolling back");

        let result = match self.notify_rollback(cause).await {
            None => Ok(()),
            Some((listener, source)) => Err(AppError::Rollback { listener, source }),
        };

        self.release(result)
    }

    /// 在工作单元内执行 `work`：启动 → 运行 → 成功则提交，失败则以该错误为原因回滚。
    ///
    /// 若 `work` 被取消（future 被丢弃）或发生 panic，工作单元会被标记为 `RolledBack`
    /// 并从上下文栈中移除（不会调用异步的回滚通知）。
    ///
    /// 整个过程运行在任务本地栈中（`CurrentUnitOfWork::within_scope`）：已在作用域内时嵌套于
    /// 外层工作单元之下，否则使用全新的栈，同一线程上的其它任务不可见。
    pub async fn execute<T, Fut>(&self, work: Fut) -> AppResult<T>
    where
        Fut: Future<Output = AppResult<T>>,
    {
        CurrentUnitOfWork::within_scope(self.run(work)).await
    }

    async fn run<T, Fut>(&self, work: Fut) -> AppResult<T>
    where
        Fut: Future<Output = AppResult<T>>,
    {
        self.start()?;
        let guard = AbandonGuard { uow: self };

        let result = match work.await {
            Ok(value) if self.is_active() => self.commit().await.map(|()| value),
            Ok(value) => Ok(value),
            Err(error) => {
                if self.is_active() {
                    let cause: &RollbackCause = &error;
                    if let Err(rollback_error) = self.rollback(Some(cause)).await {
                        warn!(
                            uow_id = %self.id(),
                            error = %rollback_error,
                            "rollback after failed work reported an error"
                        );
                    }
                }
                Err(error)
            }
        };

        drop(guard);
        result
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: UnitOfWorkStatus) {
        let mut state = self.lock();
        state.status = status;
        if status == UnitOfWorkStatus::RolledBack {
            state.staged_events.clear();
        }
    }

    fn is_concluded(&self) -> bool {
        self.lock().concluded
    }

    fn ensure_open(state: &State, action: &str) -> AppResult<()> {
        match state.status {
            UnitOfWorkStatus::Active | UnitOfWorkStatus::PreparingCommit => Ok(()),
            status => Err(AppError::illegal_state(format!(
                "cannot {action} a unit of work that is {status}"
            ))),
        }
    }

    fn ensure_can_conclude(&self, action: &str, allowed: &[UnitOfWorkStatus]) -> AppResult<()> {
        let (started, status) = {
            let state = self.lock();
            (state.started, state.status)
        };

        if !started {
            return Err(AppError::illegal_state(format!(
                "cannot {action} a unit of work that has not been started"
            )));
        }
        if !allowed.contains(&status) {
            return Err(AppError::illegal_state(format!(
                "cannot {action} a unit of work that is {status}"
            )));
        }
        if !CurrentUnitOfWork::try_get().is_some_and(|top| top == *self) {
            return Err(AppError::illegal_state(format!(
                "cannot {action} a unit of work that is not the current one"
            )));
        }
        Ok(())
    }

    fn listener_at(&self, index: usize) -> Option<Arc<dyn UnitOfWorkListener>> {
        self.lock().listeners.get(index).cloned()
    }

    fn registered_aggregates(
        &self,
    ) -> Vec<(Arc<dyn AggregateRoot>, Arc<dyn SaveAggregateCallback>)> {
        self.lock()
            .aggregates
            .iter()
            .map(|r| (Arc::clone(&r.aggregate), Arc::clone(&r.callback)))
            .collect()
    }

    fn take_staged_events(&self) -> Vec<StagedEvent> {
        std::mem::take(&mut self.lock().staged_events)
    }

    async fn notify_prepare_commit(
        &self,
        aggregates: &[Arc<dyn AggregateRoot>],
    ) -> Result<(), ListenerFailure> {
        let mut index = 0;
        while let Some(listener) = self.listener_at(index) {
            if let Err(err) = listener.on_prepare_commit(aggregates).await {
                return Err((listener.listener_name().to_string(), err));
            }
            index += 1;
        }
        Ok(())
    }

    async fn save_aggregates_and_publish(&self) -> anyhow::Result<()> {
        for (aggregate, callback) in self.registered_aggregates() {
            callback.save(aggregate.as_ref()).await.with_context(|| {
                format!(
                    "failed to save aggregate {}/{}",
                    aggregate.aggregate_type(),
                    aggregate.aggregate_id()
                )
            })?;
        }

        for StagedEvent { bus, event } in self.take_staged_events() {
            bus.publish(&event)
                .await
                .with_context(|| format!("failed to publish event {}", event.event_id()))?;
        }

        Ok(())
    }

    async fn notify_after_commit(&self) -> Option<ListenerFailure> {
        let mut first_failure = None;
        let mut index = 0;
        while let Some(listener) = self.listener_at(index) {
            if let Err(err) = listener.after_commit().await {
                let name = listener.listener_name().to_string();
                if first_failure.is_none() {
                    first_failure = Some((name, err));
                } else {
                    warn!(
                        uow_id = %self.id(),
                        listener = %name,
                        error = %err,
                        "after commit listener failed"
                    );
                }
            }
            index += 1;
        }
        first_failure
    }

    async fn notify_rollback(&self, cause: Option<&RollbackCause>) -> Option<ListenerFailure> {
        let mut first_failure = None;
        let mut index = 0;
        while let Some(listener) = self.listener_at(index) {
            if let Err(err) = listener.on_rollback(cause).await {
                let name = listener.listener_name().to_string();
                if first_failure.is_none() {
                    first_failure = Some((name, err));
                } else {
                    warn!(
                        uow_id = %self.id(),
                        listener = %name,
                        error = %err,
                        "rollback listener failed"
                    );
                }
            }
            index += 1;
        }
        first_failure
    }

    async fn roll_back_after_failure(&self, cause: &RollbackCause) {
        self.set_status(UnitOfWorkStatus::RolledBack);
        debug!(uow_id = %self.id(), cause = %cause, "commit failed, rolling back");

        if let Some((listener, err)) = self.notify_rollback(Some(cause)).await {
            warn!(
                uow_id = %self.id(),
                listener = %listener,
                error = %err,
                "rollback listener failed"
            );
        }
    }

    /// 结束工作单元并出栈；出栈失败（嵌套工作单元未清理）时返回栈错误
    fn release(&self, result: AppResult<()>) -> AppResult<()> {
        self.lock().concluded = true;

        match CurrentUnitOfWork::clear(self) {
            Ok(()) => result,
            Err(stack_error) => {
                if let Err(phase_error) = &result {
                    error!(
                        uow_id = %self.id(),
                        error = %phase_error,
                        "unit of work error masked by stack error"
                    );
                }
                Err(stack_error)
            }
        }
    }

    fn abandon(&self) {
        {
            let mut state = self.lock();
            state.status = UnitOfWorkStatus::RolledBack;
            state.concluded = true;
            state.staged_events.clear();
        }
        warn!(uow_id = %self.id(), "unit of work abandoned before commit or rollback");

        if CurrentUnitOfWork::contains(self) {
            if let Err(err) = CurrentUnitOfWork::clear(self) {
                error!(
                    uow_id = %self.id(),
                    error = %err,
                    "abandoned unit of work could not be cleared"
                );
            }
        }
    }
}

/// `execute` 的作用域守卫：work 未正常结束时放弃工作单元并出栈
struct AbandonGuard<'a> {
    uow: &'a UnitOfWork,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if !self.uow.is_concluded() {
            self.uow.abandon();
        }
    }
}

impl PartialEq for UnitOfWork {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for UnitOfWork {}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish()
    }
}
