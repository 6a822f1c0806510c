pub mod app_config;
pub mod database;
pub mod manager;
pub mod message_queue;
pub mod observability;
pub mod queue;

// Re-export main types for easier imports
pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use manager::ManagerConfig;
pub use message_queue::{MessageQueueConfig, MessageQueueType};
pub use observability::ObservabilityConfig;
pub use queue::QueueConfig;
