use serde::{Deserialize, Serialize};

/// Message queue type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageQueueType {
    #[default]
    InMemory,
    Rabbitmq,
}

/// Message queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageQueueConfig {
    #[serde(default, rename = "type")]
    pub r#type: MessageQueueType,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
    /// 内存队列每个目标的缓冲容量
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for MessageQueueConfig {
    fn default() -> Self {
        Self {
            r#type: MessageQueueType::InMemory,
            url: String::new(),
            connection_timeout_seconds: default_connection_timeout(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl MessageQueueConfig {
    pub fn is_rabbitmq(&self) -> bool {
        self.r#type == MessageQueueType::Rabbitmq
    }

    pub fn is_in_memory(&self) -> bool {
        self.r#type == MessageQueueType::InMemory
    }

    /// Validate message queue configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.r#type {
            MessageQueueType::Rabbitmq => {
                if self.url.is_empty() {
                    return Err(anyhow::anyhow!("RabbitMQ URL不能为空"));
                }
                if !self.url.starts_with("amqp://") && !self.url.starts_with("amqps://") {
                    return Err(anyhow::anyhow!("RabbitMQ URL必须以amqp://或amqps://开头"));
                }
            }
            MessageQueueType::InMemory => {
                if self.channel_capacity == 0 {
                    return Err(anyhow::anyhow!("内存队列容量必须大于0"));
                }
            }
        }

        if self.connection_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("连接超时时间必须大于0"));
        }

        Ok(())
    }
}
