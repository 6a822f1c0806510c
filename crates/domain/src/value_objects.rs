use std::time::Duration;

/// 重试策略：失败次数到下一次延迟或停止的纯函数映射
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 第一次重试前的延迟
    pub retry_delay: Duration,
    /// 每次重试延迟的增长百分比，100 表示固定延迟
    pub retry_delay_multiplier: u32,
    pub max_retry_delay: Option<Duration>,
    pub max_number_of_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    Stop,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(60),
            retry_delay_multiplier: 100,
            max_retry_delay: None,
            max_number_of_retries: 0,
        }
    }
}

impl RetryPolicy {
    pub fn new(retry_delay: Duration, max_number_of_retries: u32) -> Self {
        Self {
            retry_delay,
            max_number_of_retries,
            ..Default::default()
        }
    }

    pub fn with_multiplier(mut self, retry_delay_multiplier: u32) -> Self {
        self.retry_delay_multiplier = retry_delay_multiplier;
        self
    }

    pub fn with_max_retry_delay(mut self, max_retry_delay: Duration) -> Self {
        self.max_retry_delay = Some(max_retry_delay);
        self
    }

    pub fn never() -> Self {
        Self::default()
    }

    /// `failures` 是包含本次失败在内的累计失败次数
    pub fn retry_delay(&self, failures: u32) -> RetryDecision {
        if failures > self.max_number_of_retries {
            return RetryDecision::Stop;
        }
        let exponent = failures.saturating_sub(1) as i32;
        let factor = (self.retry_delay_multiplier as f64 / 100.0).powi(exponent);
        let secs = self.retry_delay.as_secs_f64() * factor;
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        let delay = match self.max_retry_delay {
            Some(max) if delay > max => max,
            _ => delay,
        };
        RetryDecision::Retry(delay)
    }
}

/// 队列描述：每个队列名称对应的只读配置
#[derive(Debug, Clone, PartialEq)]
pub struct QueueDescriptor {
    pub name: String,
    /// 消息代理中的目标地址
    pub destination: String,
    pub description: Option<String>,
    /// 本设备上允许同时处于 SCHEDULED 的最大记录数，0 表示不限
    pub max_queue_size: u32,
    pub retry_on_warning: bool,
    pub retry: RetryPolicy,
}

impl QueueDescriptor {
    pub fn new<S: Into<String>>(name: S, destination: S) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            description: None,
            max_queue_size: 0,
            retry_on_warning: false,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_max_queue_size(mut self, max_queue_size: u32) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_retry_on_warning(mut self, retry_on_warning: bool) -> Self {
        self.retry_on_warning = retry_on_warning;
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.max_queue_size > 0
    }

    pub fn retry_delay(&self, failures: u32) -> RetryDecision {
        self.retry.retry_delay(failures)
    }
}
