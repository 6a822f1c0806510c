//! 队列管理器配置
//!
//! 配置来源按优先级从低到高：
//!
//! 1. 内置默认值
//! 2. TOML 配置文件（显式路径或默认搜索路径）
//! 3. `QUEUE__` 前缀的环境变量，层级之间以 `__` 分隔，
//!    例如 `QUEUE__MANAGER__QUERY_FETCH_SIZE=500`

pub mod models;

#[cfg(test)]
pub mod tests;
