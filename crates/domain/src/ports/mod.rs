//! 领域对外部协作方的端口

pub mod messaging;
pub mod queue_config;

pub use messaging::*;
pub use queue_config::*;
