pub mod broker_factory;
pub mod cancellation_notifier;
pub mod database;
pub mod in_memory_broker;
pub mod rabbitmq_broker;

pub use broker_factory::BrokerFactory;
pub use cancellation_notifier::BroadcastCancellationNotifier;
pub use database::*;
pub use in_memory_broker::{Delivery, InMemoryBroker};
pub use rabbitmq_broker::RabbitMqBroker;
