//! 任务队列引擎
//!
//! 调度（含背压）、执行状态机与重试、单个与批量取消/删除、任务查询。
//! 所有外部协作方（存储、消息代理、取消通知、队列配置）都通过 `queue-domain` 中的端口注入。

pub mod cancellation;
pub mod deletion;
pub mod execution_tracker;
pub mod query_service;
pub mod queue_manager;
pub mod scheduler;

pub use cancellation::CancellationManager;
pub use deletion::DeletionManager;
pub use execution_tracker::{ExecutionListener, ExecutionTracker};
pub use query_service::TaskQueryService;
pub use queue_manager::QueueManager;
pub use scheduler::{ScheduleRequest, Scheduler, DEFAULT_PRIORITY};
