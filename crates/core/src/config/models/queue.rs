use std::time::Duration;

use queue_domain::{QueueDescriptor, RetryPolicy};
use serde::{Deserialize, Serialize};

/// 单个队列的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    /// 消息代理中的目标地址，缺省时与队列名相同
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_queue_size: u32,
    #[serde(default)]
    pub retry_on_warning: bool,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
    #[serde(default = "default_retry_delay_multiplier")]
    pub retry_delay_multiplier: u32,
    #[serde(default)]
    pub max_retry_delay_seconds: Option<u64>,
    #[serde(default)]
    pub max_number_of_retries: u32,
}

fn default_retry_delay_seconds() -> u64 {
    60
}

fn default_retry_delay_multiplier() -> u32 {
    100
}

impl QueueConfig {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            destination: None,
            description: None,
            max_queue_size: 0,
            retry_on_warning: false,
            retry_delay_seconds: default_retry_delay_seconds(),
            retry_delay_multiplier: default_retry_delay_multiplier(),
            max_retry_delay_seconds: None,
            max_number_of_retries: 0,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            return Err(anyhow::anyhow!("队列名称不能为空"));
        }

        if self.retry_delay_multiplier < 100 {
            return Err(anyhow::anyhow!(
                "队列 {} 的重试延迟倍数不能小于100",
                self.name
            ));
        }

        if let Some(max) = self.max_retry_delay_seconds {
            if max < self.retry_delay_seconds {
                return Err(anyhow::anyhow!(
                    "队列 {} 的最大重试延迟不能小于初始重试延迟",
                    self.name
                ));
            }
        }

        Ok(())
    }

    pub fn to_descriptor(&self) -> QueueDescriptor {
        let mut retry = RetryPolicy::new(
            Duration::from_secs(self.retry_delay_seconds),
            self.max_number_of_retries,
        )
        .with_multiplier(self.retry_delay_multiplier);
        if let Some(max) = self.max_retry_delay_seconds {
            retry = retry.with_max_retry_delay(Duration::from_secs(max));
        }

        QueueDescriptor {
            name: self.name.clone(),
            destination: self.destination.clone().unwrap_or_else(|| self.name.clone()),
            description: self.description.clone(),
            max_queue_size: self.max_queue_size,
            retry_on_warning: self.retry_on_warning,
            retry,
        }
    }
}
