use queue_domain::{CancellationNotifier, TaskCanceled};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// 基于 tokio broadcast 的取消通知
///
/// 没有订阅者时事件被丢弃；订阅者处理过慢时会丢失最早的事件。
#[derive(Debug, Clone)]
pub struct BroadcastCancellationNotifier {
    sender: broadcast::Sender<TaskCanceled>,
}

impl Default for BroadcastCancellationNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl BroadcastCancellationNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskCanceled> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl CancellationNotifier for BroadcastCancellationNotifier {
    fn notify(&self, event: TaskCanceled) {
        info!(
            "发送任务取消通知: task_pk={}, delivery_id={}",
            event.task_pk, event.delivery_id
        );
        if self.sender.send(event).is_err() {
            debug!("没有取消通知订阅者");
        }
    }
}
