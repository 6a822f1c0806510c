//! Test helper utilities: in-memory store and seeding

use std::sync::Arc;

use queue_domain::{TaskRecord, TaskStatus, TaskStore};
use queue_errors::QueueResult;
use queue_infrastructure::{DatabaseManager, SqliteTaskStore};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;

use crate::builders::TaskRecordBuilder;

/// 单连接的内存 SQLite，已执行迁移
pub async fn memory_database() -> QueueResult<DatabaseManager> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    DatabaseManager::from_pool(pool).await
}

pub async fn memory_store() -> QueueResult<(DatabaseManager, Arc<SqliteTaskStore>)> {
    let manager = memory_database().await?;
    let store = Arc::new(SqliteTaskStore::new(manager.pool().clone()));
    Ok((manager, store))
}

/// 按构建器写入一条记录，并补齐插入后才能设置的字段
pub async fn seed(store: &dyn TaskStore, builder: TaskRecordBuilder) -> QueueResult<TaskRecord> {
    let mut tx = store.begin().await?;
    let mut record = tx.insert(builder.record).await?;

    if builder.status != TaskStatus::Scheduled
        || builder.failure_count > 0
        || builder.error_message.is_some()
        || builder.outcome_message.is_some()
    {
        record.status = builder.status;
        record.failure_count = builder.failure_count;
        record.error_message = builder.error_message;
        record.outcome_message = builder.outcome_message;
        tx.update(&record).await?;
    }

    tx.commit().await?;
    Ok(record)
}

pub async fn seed_many(
    store: &dyn TaskStore,
    builders: Vec<TaskRecordBuilder>,
) -> QueueResult<Vec<TaskRecord>> {
    let mut records = Vec::with_capacity(builders.len());
    for builder in builders {
        records.push(seed(store, builder).await?);
    }
    Ok(records)
}

/// 按主键读取任务记录，不受投递ID变化影响
pub async fn delivery_id_by_pk(manager: &DatabaseManager, pk: i64) -> QueueResult<Option<String>> {
    let row = sqlx::query("SELECT delivery_id FROM task_records WHERE pk = ?")
        .bind(pk)
        .fetch_optional(manager.pool())
        .await?;
    match row {
        Some(row) => Ok(Some(row.try_get("delivery_id")?)),
        None => Ok(None),
    }
}

pub async fn count_rows(manager: &DatabaseManager, table: &str) -> QueueResult<i64> {
    let row = sqlx::query(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(manager.pool())
        .await?;
    Ok(row.try_get(0)?)
}
