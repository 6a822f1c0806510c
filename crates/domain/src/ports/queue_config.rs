use queue_errors::QueueResult;

use crate::value_objects::QueueDescriptor;

/// 队列名称到队列描述的只读查找
pub trait QueueConfigSource: Send + Sync {
    /// 未配置的队列返回 `QueueError::QueueNotConfigured`
    fn descriptor(&self, queue_name: &str) -> QueueResult<QueueDescriptor>;
}
