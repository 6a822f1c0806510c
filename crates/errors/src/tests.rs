use crate::*;

#[test]
fn test_queue_error_display() {
    let db_op_error = QueueError::DatabaseOperation("Connection failed".to_string());
    assert_eq!(db_op_error.to_string(), "数据库操作错误: Connection failed");

    let task_error = QueueError::TaskNotFound {
        id: "ID:123".to_string(),
    };
    assert_eq!(task_error.to_string(), "任务未找到: ID:123");

    let limit_error = QueueError::QueueSizeLimitExceeded {
        queue_name: "Export1".to_string(),
        max_queue_size: 10,
    };
    assert_eq!(
        limit_error.to_string(),
        "队列 Export1 已达到最大排队数量 10"
    );

    let state_error = QueueError::illegal_state("ID:7", "COMPLETED");
    assert_eq!(
        state_error.to_string(),
        "无法在状态 COMPLETED 下操作任务[id=ID:7]"
    );

    let mq_error = QueueError::MessageQueue("Connection refused".to_string());
    assert_eq!(mq_error.to_string(), "消息队列错误: Connection refused");
}

#[test]
fn test_queue_error_creation_methods() {
    assert!(matches!(
        QueueError::database_error("down"),
        QueueError::DatabaseOperation(_)
    ));
    assert!(matches!(
        QueueError::task_not_found("ID:1"),
        QueueError::TaskNotFound { .. }
    ));
    assert!(matches!(
        QueueError::queue_not_configured("Retrieve1"),
        QueueError::QueueNotConfigured { .. }
    ));
    assert!(matches!(
        QueueError::message_queue("broken pipe"),
        QueueError::MessageQueue(_)
    ));
    assert!(matches!(
        QueueError::invalid_params("bad"),
        QueueError::InvalidTaskParams(_)
    ));
    assert!(matches!(
        QueueError::config_error("missing"),
        QueueError::Configuration(_)
    ));
}

#[test]
fn test_is_fatal_and_retryable() {
    assert!(QueueError::Internal("boom".to_string()).is_fatal());
    assert!(QueueError::queue_not_configured("X").is_fatal());
    assert!(!QueueError::message_queue("x").is_fatal());

    assert!(QueueError::message_queue("x").is_retryable());
    assert!(QueueError::QueueSizeLimitExceeded {
        queue_name: "Q".to_string(),
        max_queue_size: 1
    }
    .is_retryable());
    assert!(!QueueError::illegal_state("ID:1", "FAILED").is_retryable());
    assert!(!QueueError::task_not_found("ID:1").is_retryable());
}

#[test]
fn test_user_message() {
    assert_eq!(
        QueueError::task_not_found("ID:1").user_message(),
        "请求的任务不存在"
    );
    assert_eq!(
        QueueError::illegal_state("ID:1", "CANCELED").user_message(),
        "任务当前状态不允许此操作"
    );
    assert_eq!(
        QueueError::Internal("x".to_string()).user_message(),
        "系统繁忙，请稍后重试"
    );
}

#[test]
fn test_error_from_sqlx() {
    let queue_error: QueueError = sqlx::Error::RowNotFound.into();
    assert!(matches!(queue_error, QueueError::Database(_)));
}

#[test]
fn test_error_from_serde_json() {
    let json_error = serde_json::Error::io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        "JSON parse error",
    ));
    let queue_error: QueueError = json_error.into();
    assert!(matches!(queue_error, QueueError::Serialization(_)));
}

#[test]
fn test_error_from_anyhow() {
    let queue_error: QueueError = anyhow::Error::msg("Some error").into();
    assert!(matches!(queue_error, QueueError::Internal(_)));
}

#[test]
fn test_queue_error_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<QueueError>();
}
