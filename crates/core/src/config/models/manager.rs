use serde::{Deserialize, Serialize};

/// 队列管理器自身的运行参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// 本设备名称，写入任务记录的 owner_node
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// 流式列表每页取回的行数
    #[serde(default = "default_query_fetch_size")]
    pub query_fetch_size: u32,
    /// 批量删除每批处理的记录数
    #[serde(default = "default_delete_task_fetch_size")]
    pub delete_task_fetch_size: u64,
}

pub fn default_device_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

fn default_query_fetch_size() -> u32 {
    100
}

fn default_delete_task_fetch_size() -> u64 {
    100
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            query_fetch_size: default_query_fetch_size(),
            delete_task_fetch_size: default_delete_task_fetch_size(),
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.device_name.trim().is_empty() {
            return Err(anyhow::anyhow!("设备名称不能为空"));
        }

        if self.query_fetch_size == 0 {
            return Err(anyhow::anyhow!("查询分页大小必须大于0"));
        }

        if self.delete_task_fetch_size == 0 {
            return Err(anyhow::anyhow!("删除批次大小必须大于0"));
        }

        Ok(())
    }
}
