//! Mock implementations for the broker and notification ports

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use queue_domain::{CancellationNotifier, MessageBroker, TaskCanceled, TaskMessage};
use queue_errors::{QueueError, QueueResult};

/// 一次成功的发送
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub delivery_id: String,
    pub destination: String,
    pub message: TaskMessage,
    pub delay: Duration,
    pub priority: i32,
}

/// Mock implementation of MessageBroker for testing
#[derive(Debug, Clone, Default)]
pub struct MockBroker {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    next_id: Arc<Mutex<u64>>,
    failing: Arc<AtomicBool>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的发送全部返回传输错误
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_sent(&self) -> Option<SentMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl MessageBroker for MockBroker {
    async fn send(
        &self,
        destination: &str,
        message: &TaskMessage,
        delay: Duration,
        priority: i32,
    ) -> QueueResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(QueueError::message_queue(format!(
                "mock broker unavailable for {destination}"
            )));
        }

        let delivery_id = {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            format!("msg-{}", *next_id)
        };

        self.sent.lock().unwrap().push(SentMessage {
            delivery_id: delivery_id.clone(),
            destination: destination.to_string(),
            message: message.clone(),
            delay,
            priority,
        });
        Ok(delivery_id)
    }
}

/// 记录所有取消通知的接收端
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<TaskCanceled>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TaskCanceled> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn canceled_pks(&self) -> Vec<i64> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.task_pk)
            .collect()
    }
}

impl CancellationNotifier for RecordingNotifier {
    fn notify(&self, event: TaskCanceled) {
        self.events.lock().unwrap().push(event);
    }
}
