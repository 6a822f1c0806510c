use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use queue_domain::{LinkedTaskFilter, TaskKind, TaskQuery, TaskStatus, TaskStore, TaskTransaction};
use queue_errors::QueueResult;

use crate::execution_tracker::ExecutionTracker;

/// 单个与批量取消
///
/// 批量取消是集合式更新：不逐条检查状态合法性，也不发送取消通知。
pub struct CancellationManager {
    store: Arc<dyn TaskStore>,
    tracker: Arc<ExecutionTracker>,
}

impl CancellationManager {
    pub fn new(store: Arc<dyn TaskStore>, tracker: Arc<ExecutionTracker>) -> Self {
        Self { store, tracker }
    }

    pub async fn cancel(&self, delivery_id: &str) -> QueueResult<bool> {
        self.tracker.cancel(delivery_id).await
    }

    /// 取消所有匹配的任务记录，返回受影响的记录数
    pub async fn cancel_matching(&self, query: &TaskQuery) -> QueueResult<u64> {
        self.cancel_in_one_unit(query, &TaskKind::ALL).await
    }

    /// 只取消关联了指定类型专用任务且满足其属性过滤的记录
    pub async fn cancel_matching_linked(
        &self,
        query: &TaskQuery,
        filter: LinkedTaskFilter,
    ) -> QueueResult<u64> {
        let kind = filter.kind();
        let query = query.clone().linked(filter);
        self.cancel_in_one_unit(&query, &[kind]).await
    }

    /// 按主键顺序返回被匹配专用任务引用的投递ID
    pub async fn referenced_task_ids(
        &self,
        query: &TaskQuery,
        filter: LinkedTaskFilter,
    ) -> QueueResult<Vec<String>> {
        let query = query.clone().linked(filter);
        self.store.list_delivery_ids(&query, &[], None).await
    }

    async fn cancel_in_one_unit(&self, query: &TaskQuery, kinds: &[TaskKind]) -> QueueResult<u64> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let canceled = cancel_set(tx.as_mut(), query, kinds, now).await?;
        tx.commit().await?;

        if canceled > 0 {
            metrics::counter!("task_queue_canceled_total").increment(canceled);
        }
        info!("批量取消 {} 个任务", canceled);
        Ok(canceled)
    }
}

/// 先给各类专用任务盖时间戳，再集合式地把任务记录置为 CANCELED
async fn cancel_set(
    tx: &mut (dyn TaskTransaction + 'static),
    query: &TaskQuery,
    kinds: &[TaskKind],
    now: DateTime<Utc>,
) -> QueueResult<u64> {
    for kind in kinds {
        tx.touch_linked_matching(*kind, query, now).await?;
    }
    tx.update_status_matching(query, TaskStatus::Canceled, now)
        .await
}
