//! 领域仓储抽象
//!
//! 任务记录的读取接口与显式的工作单元接口

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use queue_errors::QueueResult;

use crate::entities::{LinkedTask, NewTaskRecord, SpecializedTask, TaskKind, TaskRecord, TaskStatus};
use crate::task_query::{PageRequest, TaskOrder, TaskQuery};

/// 惰性、只进、不可重启的任务记录流；丢弃即释放底层连接
pub type TaskStream = BoxStream<'static, QueueResult<TaskRecord>>;

/// 任务存储
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// 开启一个独立提交的工作单元
    async fn begin(&self) -> QueueResult<Box<dyn TaskTransaction>>;

    async fn find_by_delivery_id(&self, delivery_id: &str) -> QueueResult<Option<TaskRecord>>;
    async fn find_owner_by_delivery_id(&self, delivery_id: &str) -> QueueResult<Option<String>>;
    async fn find_linked_task(&self, linked: LinkedTask) -> QueueResult<Option<SpecializedTask>>;

    async fn count(&self, query: &TaskQuery) -> QueueResult<u64>;

    /// 按给定排序返回投递ID，排序末尾总是追加主键
    async fn list_delivery_ids(
        &self,
        query: &TaskQuery,
        order: &[TaskOrder],
        limit: Option<u64>,
    ) -> QueueResult<Vec<String>>;

    async fn list_distinct_owners(&self, query: &TaskQuery) -> QueueResult<Vec<String>>;

    fn stream(&self, query: TaskQuery, page: PageRequest) -> TaskStream;
}

/// 工作单元：未调用 `commit` 即丢弃时回滚
#[async_trait]
pub trait TaskTransaction: Send {
    async fn find_by_delivery_id(&mut self, delivery_id: &str) -> QueueResult<Option<TaskRecord>>;

    /// 插入任务记录；若带有专用任务详情则同时插入并建立关联
    async fn insert(&mut self, record: NewTaskRecord) -> QueueResult<TaskRecord>;

    /// 按主键整体更新，并把 `updated_time` 级联到关联的专用任务
    async fn update(&mut self, record: &TaskRecord) -> QueueResult<()>;

    /// 删除关联的专用任务（若有）及任务记录本身
    async fn delete(&mut self, record: &TaskRecord) -> QueueResult<()>;

    /// 按主键顺序返回最多 `limit` 条匹配记录
    async fn list_matching(&mut self, query: &TaskQuery, limit: u64) -> QueueResult<Vec<TaskRecord>>;

    /// 对某一种专用任务中、其任务记录匹配谓词的行设置 `updated_time`
    async fn touch_linked_matching(
        &mut self,
        kind: TaskKind,
        query: &TaskQuery,
        now: DateTime<Utc>,
    ) -> QueueResult<u64>;

    /// 对所有匹配的任务记录集合式地设置状态与 `updated_time`
    async fn update_status_matching(
        &mut self,
        query: &TaskQuery,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> QueueResult<u64>;

    async fn commit(self: Box<Self>) -> QueueResult<()>;
}
