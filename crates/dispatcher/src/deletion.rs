use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use queue_domain::{CancellationNotifier, TaskCanceled, TaskQuery, TaskRecord, TaskStatus, TaskStore};
use queue_errors::QueueResult;

/// 单个与批量删除
///
/// 删除处理中的任务会发出取消通知；通知在提交之后发出。
pub struct DeletionManager {
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn CancellationNotifier>,
    batch_size: u64,
}

impl DeletionManager {
    pub fn new(
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn CancellationNotifier>,
        batch_size: u64,
    ) -> Self {
        Self {
            store,
            notifier,
            batch_size: batch_size.max(1),
        }
    }

    /// 删除任务记录及其关联的专用任务；记录不存在返回 `false`
    pub async fn delete(&self, delivery_id: &str) -> QueueResult<bool> {
        let mut tx = self.store.begin().await?;
        let Some(record) = tx.find_by_delivery_id(delivery_id).await? else {
            return Ok(false);
        };

        tx.delete(&record).await?;
        tx.commit().await?;

        self.after_deleted(std::slice::from_ref(&record));
        Ok(true)
    }

    /// 在一个工作单元中按主键顺序删除最多 `limit` 条匹配记录
    pub async fn delete_matching(&self, query: &TaskQuery, limit: u64) -> QueueResult<u64> {
        if limit == 0 {
            return Ok(0);
        }

        let mut tx = self.store.begin().await?;
        let records = tx.list_matching(query, limit).await?;
        for record in &records {
            tx.delete(record).await?;
        }
        tx.commit().await?;

        self.after_deleted(&records);
        Ok(records.len() as u64)
    }

    /// 以配置的批次大小反复删除，直到某一批不满
    pub async fn delete_matching_in_batches(&self, query: &TaskQuery) -> QueueResult<u64> {
        let mut total = 0;
        loop {
            let deleted = self.delete_matching(query, self.batch_size).await?;
            total += deleted;
            debug!("本批删除 {} 个任务，累计 {}", deleted, total);
            if deleted < self.batch_size {
                break;
            }
        }
        info!("批量删除完成，共删除 {} 个任务", total);
        Ok(total)
    }

    fn after_deleted(&self, records: &[TaskRecord]) {
        let now = Utc::now();
        for record in records {
            if record.status == TaskStatus::InProcess {
                self.notifier.notify(TaskCanceled::for_record(record, now));
            }
            metrics::counter!("task_queue_deleted_total", "queue" => record.queue_name.clone())
                .increment(1);
            info!("删除{}", record.entity_description());
        }
    }
}
