//! Task query builder - Handles dynamic SQL construction for task record predicates
//!
//! 所有条件都以 `task_records.` 限定列名，便于嵌入子查询与 EXISTS 关联。

use chrono::{DateTime, Utc};
use queue_domain::{DateRange, TaskKind, TaskOrder, TaskQuery, TaskStatus};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;

pub const TASK_COLUMNS: &str = "task_records.pk, task_records.delivery_id, task_records.owner_node, \
     task_records.queue_name, task_records.status, task_records.priority, task_records.batch_id, \
     task_records.scheduled_time, task_records.processing_start_time, task_records.processing_end_time, \
     task_records.created_time, task_records.updated_time, task_records.failure_count, \
     task_records.error_message, task_records.outcome_message, task_records.payload, \
     task_records.linked_kind, task_records.linked_pk";

pub struct TaskQueryBuilder;

impl TaskQueryBuilder {
    /// 构建 WHERE 子句（含前导空格），参数按出现顺序追加到 `params`
    pub fn build_where(query: &TaskQuery, params: &mut Vec<TaskQueryParam>) -> String {
        let mut clause = " WHERE 1=1".to_string();

        if let Some(owner_node) = &query.owner_node {
            clause.push_str(" AND task_records.owner_node = ?");
            params.push(TaskQueryParam::String(owner_node.clone()));
        }

        if !query.queue_names.is_empty() {
            let placeholders = vec!["?"; query.queue_names.len()].join(", ");
            clause.push_str(&format!(" AND task_records.queue_name IN ({placeholders})"));
            params.extend(query.queue_names.iter().cloned().map(TaskQueryParam::String));
        }

        if let Some(status) = query.status {
            clause.push_str(" AND task_records.status = ?");
            params.push(TaskQueryParam::Status(status));
        }

        if let Some(batch_id) = &query.batch_id {
            clause.push_str(" AND task_records.batch_id = ?");
            params.push(TaskQueryParam::String(batch_id.clone()));
        }

        if let Some(delivery_id) = &query.delivery_id {
            clause.push_str(" AND task_records.delivery_id = ?");
            params.push(TaskQueryParam::String(delivery_id.clone()));
        }

        Self::push_range(&mut clause, params, "created_time", &query.created_time);
        Self::push_range(&mut clause, params, "updated_time", &query.updated_time);
        Self::push_range(&mut clause, params, "scheduled_time", &query.scheduled_time);

        if let Some(linked) = &query.linked {
            let kind = linked.kind();
            clause.push_str(&format!(
                " AND task_records.linked_kind = ? AND EXISTS (SELECT 1 FROM {} l WHERE l.task_pk = task_records.pk",
                kind.table_name()
            ));
            params.push(TaskQueryParam::Kind(kind));
            for (column, value) in linked.conditions() {
                clause.push_str(&format!(" AND l.{column} = ?"));
                params.push(TaskQueryParam::String(value.to_string()));
            }
            clause.push(')');
        }

        clause
    }

    fn push_range(
        clause: &mut String,
        params: &mut Vec<TaskQueryParam>,
        column: &str,
        range: &DateRange,
    ) {
        if let Some(start) = range.start {
            clause.push_str(&format!(" AND task_records.{column} >= ?"));
            params.push(TaskQueryParam::DateTime(start));
        }
        if let Some(end) = range.end {
            clause.push_str(&format!(" AND task_records.{column} <= ?"));
            params.push(TaskQueryParam::DateTime(end));
        }
    }

    /// 调用方指定的排序之后总是追加主键，保证分页稳定
    pub fn build_order_by(order: &[TaskOrder]) -> String {
        let mut keys: Vec<String> = order
            .iter()
            .map(|o| format!("task_records.{}", o.to_sql()))
            .collect();
        keys.push("task_records.pk ASC".to_string());
        format!(" ORDER BY {}", keys.join(", "))
    }

    /// 不含 LIMIT/OFFSET 的列表查询
    pub fn build_select_query(query: &TaskQuery, order: &[TaskOrder]) -> (String, Vec<TaskQueryParam>) {
        let mut params = Vec::new();
        let mut sql = format!("SELECT {TASK_COLUMNS} FROM task_records");
        sql.push_str(&Self::build_where(query, &mut params));
        sql.push_str(&Self::build_order_by(order));
        (sql, params)
    }

    pub fn build_count_query(query: &TaskQuery) -> (String, Vec<TaskQueryParam>) {
        let mut params = Vec::new();
        let mut sql = "SELECT COUNT(*) FROM task_records".to_string();
        sql.push_str(&Self::build_where(query, &mut params));
        (sql, params)
    }

    pub fn build_delivery_ids_query(
        query: &TaskQuery,
        order: &[TaskOrder],
        limit: Option<u64>,
    ) -> (String, Vec<TaskQueryParam>) {
        let mut params = Vec::new();
        let mut sql = "SELECT task_records.delivery_id FROM task_records".to_string();
        sql.push_str(&Self::build_where(query, &mut params));
        sql.push_str(&Self::build_order_by(order));
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            params.push(TaskQueryParam::Int64(clamp_i64(limit)));
        }
        (sql, params)
    }

    pub fn build_distinct_owners_query(query: &TaskQuery) -> (String, Vec<TaskQueryParam>) {
        let mut params = Vec::new();
        let mut sql = "SELECT DISTINCT task_records.owner_node FROM task_records".to_string();
        sql.push_str(&Self::build_where(query, &mut params));
        sql.push_str(" ORDER BY task_records.owner_node");
        (sql, params)
    }

    /// 为某一种专用任务中、其任务记录匹配谓词的行设置更新时间
    pub fn build_touch_linked_query(
        kind: TaskKind,
        query: &TaskQuery,
        now: DateTime<Utc>,
    ) -> (String, Vec<TaskQueryParam>) {
        let mut params = vec![TaskQueryParam::DateTime(now)];
        let mut sql = format!(
            "UPDATE {} SET updated_time = ? WHERE task_pk IN (SELECT task_records.pk FROM task_records",
            kind.table_name()
        );
        sql.push_str(&Self::build_where(query, &mut params));
        sql.push(')');
        (sql, params)
    }

    pub fn build_update_status_query(
        query: &TaskQuery,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> (String, Vec<TaskQueryParam>) {
        let mut params = vec![TaskQueryParam::Status(status), TaskQueryParam::DateTime(now)];
        let mut sql = "UPDATE task_records SET status = ?, updated_time = ? \
                       WHERE pk IN (SELECT task_records.pk FROM task_records"
            .to_string();
        sql.push_str(&Self::build_where(query, &mut params));
        sql.push(')');
        (sql, params)
    }
}

/// Query parameter for task queries
#[derive(Debug, Clone, PartialEq)]
pub enum TaskQueryParam {
    String(String),
    Status(TaskStatus),
    Kind(TaskKind),
    Int64(i64),
    DateTime(DateTime<Utc>),
}

impl TaskQueryParam {
    pub fn bind<'q>(
        &self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            TaskQueryParam::String(value) => query.bind(value.clone()),
            TaskQueryParam::Status(value) => query.bind(*value),
            TaskQueryParam::Kind(value) => query.bind(*value),
            TaskQueryParam::Int64(value) => query.bind(*value),
            TaskQueryParam::DateTime(value) => query.bind(*value),
        }
    }
}

pub fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[TaskQueryParam],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = param.bind(query);
    }
    query
}

pub fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
