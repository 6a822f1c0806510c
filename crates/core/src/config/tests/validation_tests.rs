use crate::config::models::{AppConfig, MessageQueueType, QueueConfig};

#[test]
fn test_invalid_database_url() {
    let mut config = AppConfig::default();
    config.database.url = "postgresql://localhost/queue".to_string();
    assert!(config.validate().is_err());

    config.database.url = String::new();
    assert!(config.validate().is_err());
}

#[test]
fn test_rabbitmq_requires_amqp_url() {
    let mut config = AppConfig::default();
    config.message_queue.r#type = MessageQueueType::Rabbitmq;
    assert!(config.validate().is_err());

    config.message_queue.url = "redis://localhost:6379".to_string();
    assert!(config.validate().is_err());

    config.message_queue.url = "amqp://localhost:5672".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_duplicate_queue_names_rejected() {
    let mut config = AppConfig::default();
    config.queues.push(QueueConfig::new("Export1"));
    config.queues.push(QueueConfig::new("Export1"));

    let err = config.validate().unwrap_err();
    assert!(format!("{err:#}").contains("Export1"));
}

#[test]
fn test_retry_settings_validated() {
    let mut queue = QueueConfig::new("Export1");
    queue.retry_delay_multiplier = 50;
    assert!(queue.validate().is_err());

    let mut queue = QueueConfig::new("Export1");
    queue.retry_delay_seconds = 120;
    queue.max_retry_delay_seconds = Some(60);
    assert!(queue.validate().is_err());
}

#[test]
fn test_manager_fetch_sizes_must_be_positive() {
    let mut config = AppConfig::default();
    config.manager.query_fetch_size = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.manager.delete_task_fetch_size = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_log_settings() {
    let mut config = AppConfig::default();
    config.observability.log_level = "verbose".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.observability.log_format = "xml".to_string();
    assert!(config.validate().is_err());
}
