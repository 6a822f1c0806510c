//! # Queue Testing Utils
//!
//! 队列引擎各 crate 共享的测试工具：
//!
//! - **Mock Broker**: 记录所有发送、可按需注入传输失败的消息代理
//! - **Recording Notifier**: 记录取消通知的接收端
//! - **Builders**: 任务记录测试数据构建器
//! - **Helpers**: 内存 SQLite 存储与种子数据
//!
//! ```toml
//! [dev-dependencies]
//! queue-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

// Re-export commonly used items
pub use builders::*;
pub use helpers::*;
pub use mocks::*;
