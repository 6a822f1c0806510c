pub mod config;
pub mod logging;
pub mod queue_registry;

pub use config::models::*;
pub use logging::init_logging;
pub use queue_registry::QueueRegistry;
