pub mod mapping;
pub mod sqlite_task_store;
pub mod sqlite_task_transaction;
pub mod task_query_builder;

pub use sqlite_task_store::SqliteTaskStore;
pub use sqlite_task_transaction::SqliteTaskTransaction;
pub use task_query_builder::{TaskQueryBuilder, TaskQueryParam};
