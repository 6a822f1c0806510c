use std::collections::VecDeque;

use async_trait::async_trait;
use futures::StreamExt;
use queue_domain::{
    LinkedTask, PageRequest, SpecializedTask, TaskOrder, TaskQuery, TaskRecord, TaskStore,
    TaskStream, TaskTransaction,
};
use queue_errors::{QueueError, QueueResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::mapping::{count_from_row, row_to_specialized_task, row_to_task_record, specialized_select};
use super::sqlite_task_transaction::SqliteTaskTransaction;
use super::task_query_builder::{bind_all, clamp_i64, TaskQueryBuilder, TaskQueryParam, TASK_COLUMNS};

pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn begin(&self) -> QueueResult<Box<dyn TaskTransaction>> {
        // 先读后写的工作单元必须一开始就持有写锁，否则并发升级写锁会直接返回 SQLITE_BUSY
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(QueueError::Database)?;
        Ok(Box::new(SqliteTaskTransaction::new(tx)))
    }

    async fn find_by_delivery_id(&self, delivery_id: &str) -> QueueResult<Option<TaskRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM task_records WHERE task_records.delivery_id = ?"
        ))
        .bind(delivery_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueueError::Database)?;

        row.as_ref().map(row_to_task_record).transpose()
    }

    async fn find_owner_by_delivery_id(&self, delivery_id: &str) -> QueueResult<Option<String>> {
        let row = sqlx::query("SELECT owner_node FROM task_records WHERE delivery_id = ?")
            .bind(delivery_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueueError::Database)?;

        match row {
            Some(row) => Ok(Some(row.try_get("owner_node")?)),
            None => Ok(None),
        }
    }

    async fn find_linked_task(&self, linked: LinkedTask) -> QueueResult<Option<SpecializedTask>> {
        let row = sqlx::query(&specialized_select(linked.kind))
            .bind(linked.pk)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueueError::Database)?;

        row.as_ref()
            .map(|row| row_to_specialized_task(linked.kind, row))
            .transpose()
    }

    async fn count(&self, query: &TaskQuery) -> QueueResult<u64> {
        let (sql, params) = TaskQueryBuilder::build_count_query(query);
        let row = bind_all(sqlx::query(&sql), &params)
            .fetch_one(&self.pool)
            .await
            .map_err(QueueError::Database)?;

        count_from_row(&row)
    }

    async fn list_delivery_ids(
        &self,
        query: &TaskQuery,
        order: &[TaskOrder],
        limit: Option<u64>,
    ) -> QueueResult<Vec<String>> {
        let (sql, params) = TaskQueryBuilder::build_delivery_ids_query(query, order, limit);
        let rows = bind_all(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(QueueError::Database)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(QueueError::Database))
            .collect()
    }

    async fn list_distinct_owners(&self, query: &TaskQuery) -> QueueResult<Vec<String>> {
        let (sql, params) = TaskQueryBuilder::build_distinct_owners_query(query);
        let rows = bind_all(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(QueueError::Database)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(QueueError::Database))
            .collect()
    }

    fn stream(&self, query: TaskQuery, page: PageRequest) -> TaskStream {
        let (sql, params) = TaskQueryBuilder::build_select_query(&query, &page.order);
        let cursor = PageCursor {
            pool: self.pool.clone(),
            sql,
            params,
            next_offset: page.offset,
            remaining: page.limit,
            fetch_size: u64::from(page.fetch_size.max(1)),
            buffer: VecDeque::new(),
            exhausted: false,
        };

        futures::stream::try_unfold(cursor, |mut cursor| async move {
            loop {
                if let Some(record) = cursor.buffer.pop_front() {
                    return Ok::<_, QueueError>(Some((record, cursor)));
                }
                if cursor.exhausted {
                    return Ok(None);
                }
                cursor.fetch_next_page().await?;
            }
        })
        .boxed()
    }
}

/// 分页游标：每页单独获取并归还连接
struct PageCursor {
    pool: SqlitePool,
    sql: String,
    params: Vec<TaskQueryParam>,
    next_offset: u64,
    remaining: Option<u64>,
    fetch_size: u64,
    buffer: VecDeque<TaskRecord>,
    exhausted: bool,
}

impl PageCursor {
    async fn fetch_next_page(&mut self) -> QueueResult<()> {
        let page_size = match self.remaining {
            Some(remaining) => remaining.min(self.fetch_size),
            None => self.fetch_size,
        };
        if page_size == 0 {
            self.exhausted = true;
            return Ok(());
        }

        let sql = format!("{} LIMIT ? OFFSET ?", self.sql);
        let rows = bind_all(sqlx::query(&sql), &self.params)
            .bind(clamp_i64(page_size))
            .bind(clamp_i64(self.next_offset))
            .fetch_all(&self.pool)
            .await
            .map_err(QueueError::Database)?;

        let fetched = rows.len() as u64;
        debug!("分页读取任务记录: offset={}, fetched={}", self.next_offset, fetched);

        for row in &rows {
            self.buffer.push_back(row_to_task_record(row)?);
        }

        self.next_offset += fetched;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= fetched;
        }
        if fetched < page_size {
            self.exhausted = true;
        }
        Ok(())
    }
}
