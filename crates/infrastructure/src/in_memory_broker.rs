use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use queue_domain::{MessageBroker, TaskMessage};
use queue_errors::{QueueError, QueueResult};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 投递到内存队列中的一条消息
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub delivery_id: String,
    pub priority: i32,
    pub message: TaskMessage,
}

/// 内存消息代理
///
/// 使用 Tokio channels 实现，每个目标地址一个有界通道，适用于嵌入式部署和测试。
/// 延迟投递通过后台定时任务完成；同一通道内按到达顺序消费，不做优先级重排。
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    queues: Arc<RwLock<HashMap<String, QueueChannels>>>,
    capacity: usize,
}

#[derive(Debug, Clone)]
struct QueueChannels {
    sender: mpsc::Sender<Delivery>,
    receiver: Arc<Mutex<mpsc::Receiver<Delivery>>>,
    /// 已发送但尚未投递或消费的消息数
    pending: Arc<AtomicU32>,
}

impl QueueChannels {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            pending: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl InMemoryBroker {
    pub fn new(capacity: usize) -> Self {
        info!("创建内存消息代理, 通道容量: {}", capacity);
        Self {
            queues: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    async fn channels(&self, destination: &str) -> QueueChannels {
        if let Some(channels) = self.queues.read().await.get(destination) {
            return channels.clone();
        }
        let mut queues = self.queues.write().await;
        queues
            .entry(destination.to_string())
            .or_insert_with(|| {
                debug!("创建内存队列: {}", destination);
                QueueChannels::new(self.capacity)
            })
            .clone()
    }

    /// 非阻塞地取出一条已到期的消息
    pub async fn try_receive(&self, destination: &str) -> Option<Delivery> {
        let channels = self.channels(destination).await;
        let mut receiver = channels.receiver.lock().await;
        let delivery = receiver.try_recv().ok();
        if delivery.is_some() {
            channels.pending.fetch_sub(1, Ordering::SeqCst);
        }
        delivery
    }

    /// 等待下一条消息，超时返回 None
    pub async fn receive(&self, destination: &str, timeout: Duration) -> Option<Delivery> {
        let channels = self.channels(destination).await;
        let mut receiver = channels.receiver.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(delivery)) => {
                channels.pending.fetch_sub(1, Ordering::SeqCst);
                Some(delivery)
            }
            _ => None,
        }
    }

    /// 包括尚未到期的延迟消息在内的积压数量
    pub async fn pending(&self, destination: &str) -> u32 {
        match self.queues.read().await.get(destination) {
            Some(channels) => channels.pending.load(Ordering::SeqCst),
            None => 0,
        }
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn send(
        &self,
        destination: &str,
        message: &TaskMessage,
        delay: Duration,
        priority: i32,
    ) -> QueueResult<String> {
        let channels = self.channels(destination).await;
        let delivery = Delivery {
            delivery_id: Uuid::new_v4().to_string(),
            priority,
            message: message.clone(),
        };
        let delivery_id = delivery.delivery_id.clone();

        if delay.is_zero() {
            channels
                .sender
                .try_send(delivery)
                .map_err(|e| QueueError::message_queue(format!("发送消息到 {destination} 失败: {e}")))?;
            channels.pending.fetch_add(1, Ordering::SeqCst);
        } else {
            if channels.sender.is_closed() {
                return Err(QueueError::message_queue(format!("队列 {destination} 已关闭")));
            }
            channels.pending.fetch_add(1, Ordering::SeqCst);
            let destination = destination.to_string();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = channels.sender.send(delivery).await {
                    channels.pending.fetch_sub(1, Ordering::SeqCst);
                    warn!("延迟消息投递到 {} 失败: {}", destination, e);
                }
            });
        }

        debug!(
            "消息已发送到 {}: delivery_id={}, delay={:?}, priority={}",
            destination, delivery_id, delay, priority
        );
        Ok(delivery_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(queue_name: &str) -> TaskMessage {
        TaskMessage {
            queue_name: queue_name.to_string(),
            batch_id: None,
            body: b"{\"study\":\"1.2.3\"}".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let broker = InMemoryBroker::new(8);
        let id = broker
            .send("Export1", &message("Export1"), Duration::ZERO, 4)
            .await
            .unwrap();

        assert_eq!(broker.pending("Export1").await, 1);
        let delivery = broker.try_receive("Export1").await.unwrap();
        assert_eq!(delivery.delivery_id, id);
        assert_eq!(delivery.priority, 4);
        assert_eq!(delivery.message, message("Export1"));
        assert_eq!(broker.pending("Export1").await, 0);
        assert!(broker.try_receive("Export1").await.is_none());
    }

    #[tokio::test]
    async fn test_delivery_ids_are_unique() {
        let broker = InMemoryBroker::default();
        let first = broker
            .send("Export1", &message("Export1"), Duration::ZERO, 0)
            .await
            .unwrap();
        let second = broker
            .send("Export1", &message("Export1"), Duration::ZERO, 0)
            .await
            .unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_delivery() {
        let broker = InMemoryBroker::new(8);
        broker
            .send("Retrieve1", &message("Retrieve1"), Duration::from_secs(5), 0)
            .await
            .unwrap();

        assert!(broker.try_receive("Retrieve1").await.is_none());
        assert_eq!(broker.pending("Retrieve1").await, 1);

        let delivery = broker.receive("Retrieve1", Duration::from_secs(10)).await;
        assert!(delivery.is_some());
        assert_eq!(broker.pending("Retrieve1").await, 0);
    }

    #[tokio::test]
    async fn test_full_channel_is_transport_error() {
        let broker = InMemoryBroker::new(1);
        broker
            .send("Export1", &message("Export1"), Duration::ZERO, 0)
            .await
            .unwrap();
        let err = broker
            .send("Export1", &message("Export1"), Duration::ZERO, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::MessageQueue(_)));
    }
}
