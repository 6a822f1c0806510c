use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use queue_domain::{
    CancellationNotifier, Outcome, QueueDescriptor, RetryDecision, TaskCanceled, TaskRecord,
    TaskStatus, TaskStore, TaskTransaction,
};
use queue_errors::{QueueError, QueueResult};

use crate::scheduler::Scheduler;

/// Worker处理任务时的回调入口
///
/// 记录已删除或状态不允许时返回 `Ok(None)`，调用方据此放弃处理。
#[async_trait]
pub trait ExecutionListener: Send + Sync {
    async fn on_start(&self, delivery_id: &str) -> QueueResult<Option<TaskRecord>>;

    async fn on_success(
        &self,
        delivery_id: &str,
        outcome: Outcome,
    ) -> QueueResult<Option<TaskRecord>>;

    async fn on_failure(&self, delivery_id: &str, error: &str) -> QueueResult<Option<TaskRecord>>;
}

/// 任务状态机，每次调用都是独立提交的工作单元
pub struct ExecutionTracker {
    store: Arc<dyn TaskStore>,
    scheduler: Arc<Scheduler>,
    notifier: Arc<dyn CancellationNotifier>,
}

impl ExecutionTracker {
    pub fn new(
        store: Arc<dyn TaskStore>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<dyn CancellationNotifier>,
    ) -> Self {
        Self {
            store,
            scheduler,
            notifier,
        }
    }

    /// 取消一个尚未结束的任务
    ///
    /// 记录不存在返回 `false`；终态记录返回 `IllegalTaskState` 且不做修改。
    pub async fn cancel(&self, delivery_id: &str) -> QueueResult<bool> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let Some(mut record) = tx.find_by_delivery_id(delivery_id).await? else {
            return Ok(false);
        };

        if record.status.is_terminal() {
            return Err(QueueError::illegal_state(delivery_id, record.status));
        }

        record.status = TaskStatus::Canceled;
        record.touch(now);
        tx.update(&record).await?;
        tx.commit().await?;

        self.emit_canceled(&record, now);
        info!("取消处理{}", record.entity_description());
        Ok(true)
    }

    /// 重新调度：可选地迁移到另一个队列，清零失败次数并以零延迟重新发送
    pub async fn reschedule(
        &self,
        delivery_id: &str,
        queue_name: Option<&str>,
    ) -> QueueResult<Option<TaskRecord>> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let Some(mut record) = tx.find_by_delivery_id(delivery_id).await? else {
            return Ok(None);
        };

        let canceled = if record.status.is_active() {
            let event = TaskCanceled::for_record(&record, now);
            record.status = TaskStatus::Canceled;
            record.touch(now);
            Some(event)
        } else {
            None
        };

        if let Some(queue_name) = queue_name {
            record.queue_name = queue_name.to_string();
        }
        let descriptor = self.scheduler.descriptor(&record.queue_name)?;

        record.failure_count = 0;
        record.error_message = None;
        record.outcome_message = None;
        self.scheduler
            .resend(&mut record, &descriptor, Duration::ZERO, now)
            .await?;
        tx.update(&record).await?;
        tx.commit().await?;

        if let Some(event) = canceled {
            metrics::counter!("task_queue_canceled_total", "queue" => event.queue_name.clone())
                .increment(1);
            self.notifier.notify(event);
        }
        info!("重新调度{}", record.entity_description());
        Ok(Some(record))
    }

    async fn find_processable(
        &self,
        tx: &mut Box<dyn TaskTransaction>,
        delivery_id: &str,
    ) -> QueueResult<Option<TaskRecord>> {
        match tx.find_by_delivery_id(delivery_id).await? {
            None => {
                info!("任务[id={}]已被删除，忽略处理结果", delivery_id);
                Ok(None)
            }
            Some(record) if record.status.is_terminal() => {
                info!(
                    "忽略{}的处理结果，当前状态: {}",
                    record.entity_description(),
                    record.status
                );
                Ok(None)
            }
            Some(record) => Ok(Some(record)),
        }
    }

    /// 失败计数加一后按重试策略重新发送，或落入 `final_status`
    async fn retry_or_stop(
        &self,
        record: &mut TaskRecord,
        descriptor: &QueueDescriptor,
        final_status: TaskStatus,
        now: DateTime<Utc>,
    ) {
        let failures = record.increment_failures();
        match descriptor.retry_delay(failures) {
            RetryDecision::Retry(delay) => {
                match self.scheduler.resend(record, descriptor, delay, now).await {
                    Ok(()) => {
                        metrics::counter!(
                            "task_queue_retried_total",
                            "queue" => record.queue_name.clone()
                        )
                        .increment(1);
                        info!(
                            "{}第 {} 次失败，{:?} 后重试",
                            record.entity_description(),
                            failures,
                            delay
                        );
                    }
                    Err(e) => {
                        warn!("{}重试发送失败: {}", record.entity_description(), e);
                        record.status = final_status;
                        record.error_message = Some(match record.error_message.take() {
                            Some(previous) => format!("{previous}; {e}"),
                            None => e.to_string(),
                        });
                        self.record_failed(record);
                    }
                }
            }
            RetryDecision::Stop => {
                warn!(
                    "{}第 {} 次失败，不再重试，状态: {}",
                    record.entity_description(),
                    failures,
                    final_status
                );
                record.status = final_status;
                self.record_failed(record);
            }
        }
    }

    fn record_failed(&self, record: &TaskRecord) {
        metrics::counter!("task_queue_failed_total", "queue" => record.queue_name.clone())
            .increment(1);
    }

    fn emit_canceled(&self, record: &TaskRecord, now: DateTime<Utc>) {
        metrics::counter!("task_queue_canceled_total", "queue" => record.queue_name.clone())
            .increment(1);
        self.notifier.notify(TaskCanceled::for_record(record, now));
    }
}

#[async_trait]
impl ExecutionListener for ExecutionTracker {
    async fn on_start(&self, delivery_id: &str) -> QueueResult<Option<TaskRecord>> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let Some(mut record) = tx.find_by_delivery_id(delivery_id).await? else {
            info!("任务[id={}]已被删除，忽略处理", delivery_id);
            return Ok(None);
        };

        if !record.status.is_active() {
            info!(
                "忽略{}的处理，当前状态: {}",
                record.entity_description(),
                record.status
            );
            return Ok(None);
        }

        info!(
            "开始处理{}，当前状态: {}",
            record.entity_description(),
            record.status
        );
        record.processing_start_time = Some(now);
        record.status = TaskStatus::InProcess;
        record.touch(now);
        tx.update(&record).await?;
        tx.commit().await?;
        Ok(Some(record))
    }

    async fn on_success(
        &self,
        delivery_id: &str,
        outcome: Outcome,
    ) -> QueueResult<Option<TaskRecord>> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let Some(mut record) = self.find_processable(&mut tx, delivery_id).await? else {
            return Ok(None);
        };
        let descriptor = self.scheduler.descriptor(&record.queue_name)?;

        let status = TaskStatus::from(outcome.status);
        record.processing_end_time = Some(now);
        record.outcome_message = Some(outcome.description);
        record.status = status;
        record.touch(now);

        let finished = status == TaskStatus::Completed
            || (status == TaskStatus::Warning && !descriptor.retry_on_warning);
        if finished {
            info!("{}处理结束，状态: {}", record.entity_description(), status);
        } else {
            self.retry_or_stop(&mut record, &descriptor, status, now).await;
        }

        tx.update(&record).await?;
        tx.commit().await?;
        Ok(Some(record))
    }

    async fn on_failure(&self, delivery_id: &str, error: &str) -> QueueResult<Option<TaskRecord>> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let Some(mut record) = self.find_processable(&mut tx, delivery_id).await? else {
            warn!("任务[id={}]处理失败: {}", delivery_id, error);
            return Ok(None);
        };
        let descriptor = self.scheduler.descriptor(&record.queue_name)?;

        record.error_message = Some(error.to_string());
        record.processing_end_time = Some(now);
        record.touch(now);
        self.retry_or_stop(&mut record, &descriptor, TaskStatus::Failed, now)
            .await;

        tx.update(&record).await?;
        tx.commit().await?;
        Ok(Some(record))
    }
}
