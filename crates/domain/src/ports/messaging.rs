use std::time::Duration;

use async_trait::async_trait;
use queue_errors::QueueResult;

use crate::entities::TaskMessage;

/// 消息代理客户端
///
/// 发送成功后返回代理分配的投递ID，发送失败返回 `QueueError::MessageQueue`。
#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn send(
        &self,
        destination: &str,
        message: &TaskMessage,
        delay: Duration,
        priority: i32,
    ) -> QueueResult<String>;
}
