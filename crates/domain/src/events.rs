//! 领域事件
//!
//! 任务取消事件及其通知端口

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::TaskRecord;

/// 领域事件基础trait
pub trait DomainEvent: Send + Sync {
    fn event_id(&self) -> Uuid;
    fn event_type(&self) -> &str;
    fn occurred_at(&self) -> DateTime<Utc>;
    fn aggregate_id(&self) -> String;
}

/// 任务被取消或删除时发出的协作式停止信号
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskCanceled {
    pub id: Uuid,
    pub task_pk: i64,
    pub delivery_id: String,
    pub queue_name: String,
    pub occurred_at: DateTime<Utc>,
}

impl TaskCanceled {
    pub fn for_record(record: &TaskRecord, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_pk: record.pk,
            delivery_id: record.delivery_id.clone(),
            queue_name: record.queue_name.clone(),
            occurred_at,
        }
    }
}

impl DomainEvent for TaskCanceled {
    fn event_id(&self) -> Uuid {
        self.id
    }

    fn event_type(&self) -> &str {
        "TaskCanceled"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn aggregate_id(&self) -> String {
        self.task_pk.to_string()
    }
}

/// 取消通知接收端
///
/// 发出即忘，不保证送达或顺序；执行任务体的一方自行观察并中止。
pub trait CancellationNotifier: Send + Sync {
    fn notify(&self, event: TaskCanceled);
}
