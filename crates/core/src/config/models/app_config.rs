use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    database::DatabaseConfig, manager::ManagerConfig, message_queue::MessageQueueConfig,
    observability::ObservabilityConfig, queue::QueueConfig,
};

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub message_queue: MessageQueueConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub queues: Vec<QueueConfig>,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: QUEUE_, nested keys joined by `__`,
    ///    e.g. `QUEUE_MANAGER__DEVICE_NAME`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/queue.toml",
                "queue.toml",
                "/etc/queue-manager/config.toml",
            ];

            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(Self::environment());

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        debug!(
            "配置加载完成: 设备 {}, 队列数 {}",
            config.manager.device_name,
            config.queues.len()
        );

        Ok(config)
    }

    /// 环境变量覆盖源
    pub(crate) fn environment() -> Environment {
        Environment::with_prefix("QUEUE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// Validate configuration effectiveness
    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置验证失败")?;

        self.message_queue
            .validate()
            .context("消息队列配置验证失败")?;

        self.manager.validate().context("管理器配置验证失败")?;

        let mut names = HashSet::new();
        for queue in &self.queues {
            queue.validate().context("队列配置验证失败")?;
            if !names.insert(queue.name.as_str()) {
                return Err(anyhow::anyhow!("队列名称重复: {}", queue.name));
            }
        }

        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }

    pub fn queue(&self, name: &str) -> Option<&QueueConfig> {
        self.queues.iter().find(|queue| queue.name == name)
    }
}
