use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lapin::{
    options::*,
    types::{AMQPValue, FieldTable, ShortString},
    publisher_confirm::Confirmation,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use queue_core::MessageQueueConfig;
use queue_domain::{MessageBroker, TaskMessage};
use queue_errors::{QueueError, QueueResult};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// JMS 风格的优先级上限
const MAX_PRIORITY: u8 = 9;

/// RabbitMQ消息代理实现
///
/// 每个目标地址声明为支持优先级的持久队列；延迟消息按延迟时长进入
/// `{destination}.delayed.{millis}` 队列，队列级 TTL 过期后经死信路由回目标队列。
/// 同一延迟队列内的消息 TTL 相同，队首过期顺序即投递顺序。
pub struct RabbitMqBroker {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
    declared: Mutex<HashSet<String>>,
}

impl RabbitMqBroker {
    /// 创建新的RabbitMQ消息代理实例
    pub async fn new(config: &MessageQueueConfig) -> QueueResult<Self> {
        let connect = Connection::connect(&config.url, ConnectionProperties::default());
        let connection = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_seconds),
            connect,
        )
        .await
        .map_err(|_| QueueError::message_queue(format!("连接RabbitMQ超时: {}", config.url)))?
        .map_err(|e| QueueError::message_queue(format!("连接RabbitMQ失败: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| QueueError::message_queue(format!("创建通道失败: {e}")))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| QueueError::message_queue(format!("开启发布确认失败: {e}")))?;

        info!("成功连接到RabbitMQ: {}", config.url);

        Ok(Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
            declared: Mutex::new(HashSet::new()),
        })
    }

    pub fn delayed_queue_name(destination: &str, delay: Duration) -> String {
        format!("{destination}.delayed.{}", delay.as_millis())
    }

    /// 声明目标队列，每个目标只声明一次
    async fn ensure_destination(&self, channel: &Channel, destination: &str) -> QueueResult<()> {
        let mut declared = self.declared.lock().await;
        if declared.contains(destination) {
            return Ok(());
        }

        let mut args = FieldTable::default();
        args.insert("x-max-priority".into(), AMQPValue::ShortShortUInt(MAX_PRIORITY));
        Self::declare_queue(channel, destination, args).await?;

        declared.insert(destination.to_string());
        Ok(())
    }

    /// 声明某个延迟时长对应的延迟队列
    async fn ensure_delay_queue(
        &self,
        channel: &Channel,
        destination: &str,
        delay: Duration,
    ) -> QueueResult<String> {
        let queue_name = Self::delayed_queue_name(destination, delay);
        let mut declared = self.declared.lock().await;
        if declared.contains(&queue_name) {
            return Ok(queue_name);
        }

        let ttl = u32::try_from(delay.as_millis()).map_err(|_| {
            QueueError::invalid_params(format!("延迟时间过长: {delay:?}"))
        })?;
        let mut args = FieldTable::default();
        args.insert("x-message-ttl".into(), AMQPValue::LongUInt(ttl));
        args.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString("".into()),
        );
        args.insert(
            "x-dead-letter-routing-key".into(),
            AMQPValue::LongString(destination.into()),
        );
        Self::declare_queue(channel, &queue_name, args).await?;

        declared.insert(queue_name.clone());
        Ok(queue_name)
    }

    async fn declare_queue(channel: &Channel, queue_name: &str, args: FieldTable) -> QueueResult<()> {
        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                args,
            )
            .await
            .map_err(|e| QueueError::message_queue(format!("声明队列 {queue_name} 失败: {e}")))?;

        debug!("队列 {} 声明成功", queue_name);
        Ok(())
    }

    /// 获取连接状态
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    /// 关闭连接
    pub async fn close(&self) -> QueueResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| QueueError::message_queue(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for RabbitMqBroker {
    async fn send(
        &self,
        destination: &str,
        message: &TaskMessage,
        delay: Duration,
        priority: i32,
    ) -> QueueResult<String> {
        let channel = self.channel.lock().await;
        self.ensure_destination(&channel, destination).await?;

        let payload = serde_json::to_vec(message)
            .map_err(|e| QueueError::Serialization(format!("序列化消息失败: {e}")))?;
        let delivery_id = Uuid::new_v4().to_string();
        let priority = priority.clamp(0, MAX_PRIORITY as i32) as u8;

        let properties = BasicProperties::default()
            .with_delivery_mode(2) // 2 = persistent
            .with_message_id(ShortString::from(delivery_id.clone()))
            .with_priority(priority);

        let routing_key = if delay.is_zero() {
            destination.to_string()
        } else {
            self.ensure_delay_queue(&channel, destination, delay).await?
        };

        let confirm = channel
            .basic_publish(
                "",
                &routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await
            .map_err(|e| {
                QueueError::message_queue(format!("发布消息到队列 {routing_key} 失败: {e}"))
            })?;

        let confirmation = confirm
            .await
            .map_err(|e| QueueError::message_queue(format!("消息发布确认失败: {e}")))?;
        check_confirmation(&confirmation, &routing_key)?;

        debug!(
            "消息已发布到队列 {}: delivery_id={}, delay={:?}",
            routing_key, delivery_id, delay
        );
        Ok(delivery_id)
    }
}

/// 只有 broker 确认接收的发布才算成功
fn check_confirmation(confirmation: &Confirmation, routing_key: &str) -> QueueResult<()> {
    match confirmation {
        Confirmation::Ack(_) | Confirmation::NotRequested => Ok(()),
        Confirmation::Nack(_) => Err(QueueError::message_queue(format!(
            "队列 {routing_key} 拒绝了发布的消息"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nack_is_a_transport_error() {
        let result = check_confirmation(&Confirmation::Nack(None), "Export1");
        assert!(matches!(result, Err(QueueError::MessageQueue(_))));
    }

    #[test]
    fn test_ack_and_unconfirmed_publish_succeed() {
        assert!(check_confirmation(&Confirmation::Ack(None), "Export1").is_ok());
        assert!(check_confirmation(&Confirmation::NotRequested, "Export1").is_ok());
    }

    #[test]
    fn test_each_delay_gets_its_own_queue() {
        assert_eq!(
            RabbitMqBroker::delayed_queue_name("Export1", Duration::from_secs(10)),
            "Export1.delayed.10000"
        );
        assert_ne!(
            RabbitMqBroker::delayed_queue_name("Export1", Duration::from_secs(10)),
            RabbitMqBroker::delayed_queue_name("Export1", Duration::from_secs(60))
        );
    }
}
