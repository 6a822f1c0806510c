use std::sync::Arc;

use queue_core::{MessageQueueConfig, MessageQueueType};
use queue_domain::MessageBroker;
use queue_errors::QueueResult;
use tracing::{debug, info};

use crate::{InMemoryBroker, RabbitMqBroker};

pub struct BrokerFactory;

impl BrokerFactory {
    pub async fn create(config: &MessageQueueConfig) -> QueueResult<Arc<dyn MessageBroker>> {
        debug!("Creating message broker with type: {:?}", config.r#type);

        match config.r#type {
            MessageQueueType::Rabbitmq => {
                info!("Initializing RabbitMQ message broker");
                let rabbitmq = RabbitMqBroker::new(config).await?;
                Ok(Arc::new(rabbitmq))
            }
            MessageQueueType::InMemory => {
                info!("Initializing in-memory message broker");
                Ok(Arc::new(InMemoryBroker::new(config.channel_capacity)))
            }
        }
    }
}
