use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("任务未找到: {id}")]
    TaskNotFound { id: String },
    #[error("队列未配置: {queue_name}")]
    QueueNotConfigured { queue_name: String },
    #[error("队列 {queue_name} 已达到最大排队数量 {max_queue_size}")]
    QueueSizeLimitExceeded {
        queue_name: String,
        max_queue_size: u32,
    },
    #[error("无法在状态 {status} 下操作任务[id={id}]")]
    IllegalTaskState { id: String, status: String },
    #[error("消息队列错误: {0}")]
    MessageQueue(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("无效的任务参数: {0}")]
    InvalidTaskParams(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

impl QueueError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn task_not_found<S: Into<String>>(id: S) -> Self {
        Self::TaskNotFound { id: id.into() }
    }
    pub fn queue_not_configured<S: Into<String>>(queue_name: S) -> Self {
        Self::QueueNotConfigured {
            queue_name: queue_name.into(),
        }
    }
    pub fn illegal_state<S: Into<String>, T: ToString>(id: S, status: T) -> Self {
        Self::IllegalTaskState {
            id: id.into(),
            status: status.to_string(),
        }
    }
    pub fn message_queue<S: Into<String>>(msg: S) -> Self {
        Self::MessageQueue(msg.into())
    }
    pub fn invalid_params<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTaskParams(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            QueueError::Internal(_)
                | QueueError::Configuration(_)
                | QueueError::QueueNotConfigured { .. }
        )
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QueueError::Database(_)
                | QueueError::DatabaseOperation(_)
                | QueueError::MessageQueue(_)
                | QueueError::QueueSizeLimitExceeded { .. }
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            QueueError::TaskNotFound { .. } => "请求的任务不存在",
            QueueError::QueueNotConfigured { .. } => "请求的队列未配置",
            QueueError::QueueSizeLimitExceeded { .. } => "队列已满，请稍后重试",
            QueueError::IllegalTaskState { .. } => "任务当前状态不允许此操作",
            QueueError::InvalidTaskParams(_) => "任务参数配置有误",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for QueueError {
    fn from(err: anyhow::Error) -> Self {
        QueueError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests;
