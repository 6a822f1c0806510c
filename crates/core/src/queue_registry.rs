use std::collections::HashMap;

use queue_domain::{QueueConfigSource, QueueDescriptor};
use queue_errors::{QueueError, QueueResult};

use crate::config::models::{AppConfig, QueueConfig};

/// 由配置构建的队列描述注册表
#[derive(Debug, Clone, Default)]
pub struct QueueRegistry {
    descriptors: HashMap<String, QueueDescriptor>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::from_queues(&config.queues)
    }

    pub fn from_queues(queues: &[QueueConfig]) -> Self {
        queues
            .iter()
            .map(QueueConfig::to_descriptor)
            .fold(Self::new(), Self::with_descriptor)
    }

    pub fn with_descriptor(mut self, descriptor: QueueDescriptor) -> Self {
        self.descriptors.insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.descriptors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl QueueConfigSource for QueueRegistry {
    fn descriptor(&self, queue_name: &str) -> QueueResult<QueueDescriptor> {
        self.descriptors
            .get(queue_name)
            .cloned()
            .ok_or_else(|| QueueError::queue_not_configured(queue_name))
    }
}
