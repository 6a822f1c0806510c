use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queue_domain::{
    LinkedTask, NewTaskRecord, TaskDetail, TaskKind, TaskQuery, TaskRecord, TaskStatus,
    TaskTransaction,
};
use queue_errors::{QueueError, QueueResult};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, instrument};

use super::mapping::row_to_task_record;
use super::task_query_builder::{
    bind_all, clamp_i64, TaskQueryBuilder, TaskQueryParam, TASK_COLUMNS,
};

/// 基于 sqlx 事务的工作单元，丢弃时自动回滚
pub struct SqliteTaskTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteTaskTransaction {
    pub fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    async fn insert_detail(
        &mut self,
        task_pk: i64,
        detail: &TaskDetail,
        now: DateTime<Utc>,
    ) -> QueueResult<i64> {
        let result = match detail {
            TaskDetail::Export(export) => {
                sqlx::query(
                    "INSERT INTO export_tasks (task_pk, created_time, updated_time, exporter_id, study_iuid, series_iuid, sop_iuid) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(task_pk)
                .bind(now)
                .bind(now)
                .bind(&export.exporter_id)
                .bind(&export.study_iuid)
                .bind(&export.series_iuid)
                .bind(&export.sop_iuid)
                .execute(&mut *self.tx)
                .await
            }
            TaskDetail::Retrieve(retrieve) => {
                sqlx::query(
                    "INSERT INTO retrieve_tasks (task_pk, created_time, updated_time, local_aet, remote_aet, destination_aet, study_iuid, series_iuid) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(task_pk)
                .bind(now)
                .bind(now)
                .bind(&retrieve.local_aet)
                .bind(&retrieve.remote_aet)
                .bind(&retrieve.destination_aet)
                .bind(&retrieve.study_iuid)
                .bind(&retrieve.series_iuid)
                .execute(&mut *self.tx)
                .await
            }
            TaskDetail::Diff(diff) => {
                sqlx::query(
                    "INSERT INTO diff_tasks (task_pk, created_time, updated_time, local_aet, primary_aet, secondary_aet, compare_fields, check_missing, check_different) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(task_pk)
                .bind(now)
                .bind(now)
                .bind(&diff.local_aet)
                .bind(&diff.primary_aet)
                .bind(&diff.secondary_aet)
                .bind(&diff.compare_fields)
                .bind(diff.check_missing)
                .bind(diff.check_different)
                .execute(&mut *self.tx)
                .await
            }
            TaskDetail::StorageVerification(stgver) => {
                sqlx::query(
                    "INSERT INTO stgver_tasks (task_pk, created_time, updated_time, local_aet, study_iuid, series_iuid, sop_iuid, storage_verification_policy) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(task_pk)
                .bind(now)
                .bind(now)
                .bind(&stgver.local_aet)
                .bind(&stgver.study_iuid)
                .bind(&stgver.series_iuid)
                .bind(&stgver.sop_iuid)
                .bind(&stgver.storage_verification_policy)
                .execute(&mut *self.tx)
                .await
            }
        }
        .map_err(QueueError::Database)?;

        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl TaskTransaction for SqliteTaskTransaction {
    async fn find_by_delivery_id(&mut self, delivery_id: &str) -> QueueResult<Option<TaskRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM task_records WHERE task_records.delivery_id = ?"
        ))
        .bind(delivery_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(QueueError::Database)?;

        row.as_ref().map(row_to_task_record).transpose()
    }

    #[instrument(skip(self, record), fields(
        delivery_id = %record.delivery_id,
        queue_name = %record.queue_name,
    ))]
    async fn insert(&mut self, record: NewTaskRecord) -> QueueResult<TaskRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO task_records (delivery_id, owner_node, queue_name, status, priority, batch_id,
                                      scheduled_time, created_time, updated_time, failure_count, payload)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&record.delivery_id)
        .bind(&record.owner_node)
        .bind(&record.queue_name)
        .bind(TaskStatus::Scheduled)
        .bind(record.priority)
        .bind(&record.batch_id)
        .bind(record.scheduled_time)
        .bind(record.created_time)
        .bind(record.created_time)
        .bind(&record.payload)
        .execute(&mut *self.tx)
        .await
        .map_err(QueueError::Database)?;

        let pk = result.last_insert_rowid();

        let linked_task = match &record.linked {
            Some(detail) => {
                let linked_pk = self.insert_detail(pk, detail, record.created_time).await?;
                let kind = detail.kind();
                sqlx::query("UPDATE task_records SET linked_kind = ?, linked_pk = ? WHERE pk = ?")
                    .bind(kind)
                    .bind(linked_pk)
                    .bind(pk)
                    .execute(&mut *self.tx)
                    .await
                    .map_err(QueueError::Database)?;
                Some(LinkedTask { kind, pk: linked_pk })
            }
            None => None,
        };

        debug!("任务记录已插入: pk={}, linked={:?}", pk, linked_task);

        Ok(TaskRecord {
            pk,
            delivery_id: record.delivery_id,
            owner_node: record.owner_node,
            queue_name: record.queue_name,
            status: TaskStatus::Scheduled,
            priority: record.priority,
            batch_id: record.batch_id,
            scheduled_time: record.scheduled_time,
            processing_start_time: None,
            processing_end_time: None,
            created_time: record.created_time,
            updated_time: record.created_time,
            failure_count: 0,
            error_message: None,
            outcome_message: None,
            payload: record.payload,
            linked_task,
        })
    }

    #[instrument(skip(self, record), fields(
        pk = %record.pk,
        delivery_id = %record.delivery_id,
        status = %record.status,
    ))]
    async fn update(&mut self, record: &TaskRecord) -> QueueResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE task_records
            SET delivery_id = ?, owner_node = ?, queue_name = ?, status = ?, priority = ?, batch_id = ?,
                scheduled_time = ?, processing_start_time = ?, processing_end_time = ?, updated_time = ?,
                failure_count = ?, error_message = ?, outcome_message = ?
            WHERE pk = ?
            "#,
        )
        .bind(&record.delivery_id)
        .bind(&record.owner_node)
        .bind(&record.queue_name)
        .bind(record.status)
        .bind(record.priority)
        .bind(&record.batch_id)
        .bind(record.scheduled_time)
        .bind(record.processing_start_time)
        .bind(record.processing_end_time)
        .bind(record.updated_time)
        .bind(i64::from(record.failure_count))
        .bind(&record.error_message)
        .bind(&record.outcome_message)
        .bind(record.pk)
        .execute(&mut *self.tx)
        .await
        .map_err(QueueError::Database)?;

        if result.rows_affected() == 0 {
            return Err(QueueError::task_not_found(record.delivery_id.clone()));
        }

        if let Some(linked) = record.linked_task {
            sqlx::query(&format!(
                "UPDATE {} SET updated_time = ? WHERE pk = ?",
                linked.kind.table_name()
            ))
            .bind(record.updated_time)
            .bind(linked.pk)
            .execute(&mut *self.tx)
            .await
            .map_err(QueueError::Database)?;
        }

        Ok(())
    }

    #[instrument(skip(self, record), fields(pk = %record.pk, delivery_id = %record.delivery_id))]
    async fn delete(&mut self, record: &TaskRecord) -> QueueResult<()> {
        if let Some(linked) = record.linked_task {
            sqlx::query(&format!("DELETE FROM {} WHERE pk = ?", linked.kind.table_name()))
                .bind(linked.pk)
                .execute(&mut *self.tx)
                .await
                .map_err(QueueError::Database)?;
        }

        sqlx::query("DELETE FROM task_records WHERE pk = ?")
            .bind(record.pk)
            .execute(&mut *self.tx)
            .await
            .map_err(QueueError::Database)?;

        debug!("任务记录已删除: {}", record.entity_description());
        Ok(())
    }

    async fn list_matching(&mut self, query: &TaskQuery, limit: u64) -> QueueResult<Vec<TaskRecord>> {
        let (mut sql, mut params) = TaskQueryBuilder::build_select_query(query, &[]);
        sql.push_str(" LIMIT ?");
        params.push(TaskQueryParam::Int64(clamp_i64(limit)));

        let rows = bind_all(sqlx::query(&sql), &params)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(QueueError::Database)?;

        rows.iter().map(row_to_task_record).collect()
    }

    #[instrument(skip(self, query))]
    async fn touch_linked_matching(
        &mut self,
        kind: TaskKind,
        query: &TaskQuery,
        now: DateTime<Utc>,
    ) -> QueueResult<u64> {
        let (sql, params) = TaskQueryBuilder::build_touch_linked_query(kind, query, now);
        let result = bind_all(sqlx::query(&sql), &params)
            .execute(&mut *self.tx)
            .await
            .map_err(QueueError::Database)?;

        debug!("{} 表中 {} 行已更新时间戳", kind.table_name(), result.rows_affected());
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, query))]
    async fn update_status_matching(
        &mut self,
        query: &TaskQuery,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> QueueResult<u64> {
        let (sql, params) = TaskQueryBuilder::build_update_status_query(query, status, now);
        let result = bind_all(sqlx::query(&sql), &params)
            .execute(&mut *self.tx)
            .await
            .map_err(QueueError::Database)?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> QueueResult<()> {
        self.tx.commit().await.map_err(QueueError::Database)
    }
}
