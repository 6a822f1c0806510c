use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use queue_domain::{
    MessageBroker, NewTaskRecord, QueueConfigSource, QueueDescriptor, TaskDetail, TaskMessage,
    TaskQuery, TaskRecord, TaskStatus, TaskStore,
};
use queue_errors::{QueueError, QueueResult};

/// 默认的 JMS 风格优先级
pub const DEFAULT_PRIORITY: i32 = 4;

/// 一次调度请求
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub queue_name: String,
    pub payload: Vec<u8>,
    pub priority: i32,
    pub batch_id: Option<String>,
    pub delay: Duration,
    pub linked: Option<TaskDetail>,
}

impl ScheduleRequest {
    pub fn new<S: Into<String>>(queue_name: S, payload: Vec<u8>) -> Self {
        Self {
            queue_name: queue_name.into(),
            payload,
            priority: DEFAULT_PRIORITY,
            batch_id: None,
            delay: Duration::ZERO,
            linked: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_batch_id<S: Into<String>>(mut self, batch_id: S) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_linked(mut self, detail: TaskDetail) -> Self {
        self.linked = Some(detail);
        self
    }
}

/// 调度器：准入控制、投递到消息代理并持久化任务记录
pub struct Scheduler {
    store: Arc<dyn TaskStore>,
    broker: Arc<dyn MessageBroker>,
    queues: Arc<dyn QueueConfigSource>,
    device_name: String,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        broker: Arc<dyn MessageBroker>,
        queues: Arc<dyn QueueConfigSource>,
        device_name: String,
    ) -> Self {
        Self {
            store,
            broker,
            queues,
            device_name,
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn descriptor(&self, queue_name: &str) -> QueueResult<QueueDescriptor> {
        self.queues.descriptor(queue_name)
    }

    /// 调度一个新任务
    ///
    /// 先发送再持久化：持久化失败时消息可能已经投递，消费端需容忍找不到记录。
    pub async fn schedule(&self, request: ScheduleRequest) -> QueueResult<TaskRecord> {
        let descriptor = self.descriptor(&request.queue_name)?;

        if descriptor.is_bounded() {
            let scheduled = self.count_scheduled(&descriptor.name).await?;
            if scheduled >= u64::from(descriptor.max_queue_size) {
                warn!(
                    "队列 {} 在设备 {} 上已有 {} 个待处理任务，拒绝调度",
                    descriptor.name, self.device_name, scheduled
                );
                return Err(QueueError::QueueSizeLimitExceeded {
                    queue_name: descriptor.name.clone(),
                    max_queue_size: descriptor.max_queue_size,
                });
            }
        }

        let message = TaskMessage {
            queue_name: request.queue_name.clone(),
            batch_id: request.batch_id.clone(),
            body: request.payload,
        };
        let delivery_id = self
            .broker
            .send(&descriptor.destination, &message, request.delay, request.priority)
            .await?;

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let record = tx
            .insert(NewTaskRecord {
                delivery_id,
                owner_node: self.device_name.clone(),
                queue_name: request.queue_name,
                priority: request.priority,
                batch_id: request.batch_id,
                scheduled_time: now + to_chrono(request.delay)?,
                created_time: now,
                payload: message.body,
                linked: request.linked,
            })
            .await?;
        tx.commit().await?;

        metrics::counter!("task_queue_scheduled_total", "queue" => record.queue_name.clone())
            .increment(1);
        info!(
            "调度任务[id={}]到队列 {}，优先级 {}",
            record.delivery_id, record.queue_name, record.priority
        );
        Ok(record)
    }

    /// 本设备上指定队列中处于 SCHEDULED 的记录数
    pub async fn count_scheduled(&self, queue_name: &str) -> QueueResult<u64> {
        self.store
            .count(&TaskQuery::scheduled_on(&self.device_name, queue_name))
            .await
    }

    /// 以原优先级重新发送记录中的负载，成功后才修改记录
    ///
    /// 调用方负责在同一工作单元中持久化修改后的记录。
    pub(crate) async fn resend(
        &self,
        record: &mut TaskRecord,
        descriptor: &QueueDescriptor,
        delay: Duration,
        now: DateTime<Utc>,
    ) -> QueueResult<()> {
        let scheduled_time = now + to_chrono(delay)?;
        let message = TaskMessage::from_record(record);
        let delivery_id = self
            .broker
            .send(&descriptor.destination, &message, delay, record.priority)
            .await?;

        debug!("任务[pk={}]的投递ID由 {} 变为 {}", record.pk, record.delivery_id, delivery_id);
        record.delivery_id = delivery_id;
        record.scheduled_time = scheduled_time;
        record.status = TaskStatus::Scheduled;
        record.owner_node = self.device_name.clone();
        record.touch(now);
        Ok(())
    }
}

fn to_chrono(delay: Duration) -> QueueResult<chrono::Duration> {
    chrono::Duration::from_std(delay)
        .map_err(|e| QueueError::invalid_params(format!("无效的延迟 {delay:?}: {e}")))
}
