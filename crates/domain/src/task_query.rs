//! 任务记录查询谓词、排序与分页

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use queue_errors::QueueError;
use serde::{Deserialize, Serialize};

use crate::entities::{TaskKind, TaskStatus};

/// 闭区间时间范围，任一端可缺省
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// 针对某一种专用任务属性的过滤条件，只有给出的字段参与匹配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LinkedTaskFilter {
    Export {
        exporter_id: Option<String>,
        study_iuid: Option<String>,
    },
    Retrieve {
        local_aet: Option<String>,
        remote_aet: Option<String>,
        destination_aet: Option<String>,
        study_iuid: Option<String>,
    },
    Diff {
        local_aet: Option<String>,
        primary_aet: Option<String>,
        secondary_aet: Option<String>,
        compare_fields: Option<String>,
    },
    StorageVerification {
        local_aet: Option<String>,
        study_iuid: Option<String>,
        storage_verification_policy: Option<String>,
    },
}

impl LinkedTaskFilter {
    pub fn any_of(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Export => LinkedTaskFilter::Export {
                exporter_id: None,
                study_iuid: None,
            },
            TaskKind::Retrieve => LinkedTaskFilter::Retrieve {
                local_aet: None,
                remote_aet: None,
                destination_aet: None,
                study_iuid: None,
            },
            TaskKind::Diff => LinkedTaskFilter::Diff {
                local_aet: None,
                primary_aet: None,
                secondary_aet: None,
                compare_fields: None,
            },
            TaskKind::StorageVerification => LinkedTaskFilter::StorageVerification {
                local_aet: None,
                study_iuid: None,
                storage_verification_policy: None,
            },
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            LinkedTaskFilter::Export { .. } => TaskKind::Export,
            LinkedTaskFilter::Retrieve { .. } => TaskKind::Retrieve,
            LinkedTaskFilter::Diff { .. } => TaskKind::Diff,
            LinkedTaskFilter::StorageVerification { .. } => TaskKind::StorageVerification,
        }
    }

    /// 专用任务表上的等值条件 (列名, 值)
    pub fn conditions(&self) -> Vec<(&'static str, &str)> {
        let candidates: Vec<(&'static str, &Option<String>)> = match self {
            LinkedTaskFilter::Export {
                exporter_id,
                study_iuid,
            } => vec![("exporter_id", exporter_id), ("study_iuid", study_iuid)],
            LinkedTaskFilter::Retrieve {
                local_aet,
                remote_aet,
                destination_aet,
                study_iuid,
            } => vec![
                ("local_aet", local_aet),
                ("remote_aet", remote_aet),
                ("destination_aet", destination_aet),
                ("study_iuid", study_iuid),
            ],
            LinkedTaskFilter::Diff {
                local_aet,
                primary_aet,
                secondary_aet,
                compare_fields,
            } => vec![
                ("local_aet", local_aet),
                ("primary_aet", primary_aet),
                ("secondary_aet", secondary_aet),
                ("compare_fields", compare_fields),
            ],
            LinkedTaskFilter::StorageVerification {
                local_aet,
                study_iuid,
                storage_verification_policy,
            } => vec![
                ("local_aet", local_aet),
                ("study_iuid", study_iuid),
                ("storage_verification_policy", storage_verification_policy),
            ],
        };
        candidates
            .into_iter()
            .filter_map(|(column, value)| value.as_deref().map(|v| (column, v)))
            .collect()
    }
}

/// 任务记录查询谓词，所有给出的条件之间为 AND 关系
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskQuery {
    pub owner_node: Option<String>,
    /// 匹配其中任意一个队列
    pub queue_names: Vec<String>,
    pub status: Option<TaskStatus>,
    pub batch_id: Option<String>,
    pub delivery_id: Option<String>,
    pub created_time: DateRange,
    pub updated_time: DateRange,
    pub scheduled_time: DateRange,
    pub linked: Option<LinkedTaskFilter>,
}

impl TaskQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner_node<S: Into<String>>(mut self, owner_node: S) -> Self {
        self.owner_node = Some(owner_node.into());
        self
    }

    pub fn queue_name<S: Into<String>>(mut self, queue_name: S) -> Self {
        self.queue_names.push(queue_name.into());
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn batch_id<S: Into<String>>(mut self, batch_id: S) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn delivery_id<S: Into<String>>(mut self, delivery_id: S) -> Self {
        self.delivery_id = Some(delivery_id.into());
        self
    }

    pub fn created_time(mut self, range: DateRange) -> Self {
        self.created_time = range;
        self
    }

    pub fn updated_time(mut self, range: DateRange) -> Self {
        self.updated_time = range;
        self
    }

    pub fn scheduled_time(mut self, range: DateRange) -> Self {
        self.scheduled_time = range;
        self
    }

    pub fn linked(mut self, filter: LinkedTaskFilter) -> Self {
        self.linked = Some(filter);
        self
    }

    /// 本设备上某队列中处于 SCHEDULED 的记录
    pub fn scheduled_on(owner_node: &str, queue_name: &str) -> Self {
        Self::new()
            .owner_node(owner_node)
            .queue_name(queue_name)
            .status(TaskStatus::Scheduled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOrderField {
    CreatedTime,
    UpdatedTime,
    ScheduledTime,
    ProcessingStartTime,
    ProcessingEndTime,
    QueueName,
    OwnerNode,
    Status,
    Priority,
    BatchId,
    FailureCount,
}

impl TaskOrderField {
    pub fn column(&self) -> &'static str {
        match self {
            TaskOrderField::CreatedTime => "created_time",
            TaskOrderField::UpdatedTime => "updated_time",
            TaskOrderField::ScheduledTime => "scheduled_time",
            TaskOrderField::ProcessingStartTime => "processing_start_time",
            TaskOrderField::ProcessingEndTime => "processing_end_time",
            TaskOrderField::QueueName => "queue_name",
            TaskOrderField::OwnerNode => "owner_node",
            TaskOrderField::Status => "status",
            TaskOrderField::Priority => "priority",
            TaskOrderField::BatchId => "batch_id",
            TaskOrderField::FailureCount => "failure_count",
        }
    }
}

impl FromStr for TaskOrderField {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdTime" => Ok(TaskOrderField::CreatedTime),
            "updatedTime" => Ok(TaskOrderField::UpdatedTime),
            "scheduledTime" => Ok(TaskOrderField::ScheduledTime),
            "processingStartTime" => Ok(TaskOrderField::ProcessingStartTime),
            "processingEndTime" => Ok(TaskOrderField::ProcessingEndTime),
            "queueName" => Ok(TaskOrderField::QueueName),
            "dicomDeviceName" | "deviceName" => Ok(TaskOrderField::OwnerNode),
            "status" => Ok(TaskOrderField::Status),
            "priority" => Ok(TaskOrderField::Priority),
            "batchID" => Ok(TaskOrderField::BatchId),
            "numberOfFailures" | "failureCount" => Ok(TaskOrderField::FailureCount),
            _ => Err(QueueError::invalid_params(format!("不支持的排序字段: {s}"))),
        }
    }
}

/// 排序键，`-field` 表示降序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOrder {
    pub field: TaskOrderField,
    pub descending: bool,
}

impl TaskOrder {
    pub fn asc(field: TaskOrderField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub fn desc(field: TaskOrderField) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    pub fn to_sql(&self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("{} {direction}", self.field.column())
    }
}

impl FromStr for TaskOrder {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix('-') {
            Some(field) => Ok(TaskOrder::desc(field.parse()?)),
            None => Ok(TaskOrder::asc(s.parse()?)),
        }
    }
}

impl fmt::Display for TaskOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// 流式列表的分页参数
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub order: Vec<TaskOrder>,
    pub offset: u64,
    pub limit: Option<u64>,
    /// 每次从存储取回的行数
    pub fetch_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            offset: 0,
            limit: None,
            fetch_size: 100,
        }
    }
}

impl PageRequest {
    /// 解析逗号分隔的排序串，例如 `-updatedTime,priority`
    pub fn parse_order(order_by: &str) -> Result<Vec<TaskOrder>, QueueError> {
        order_by
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect()
    }

    pub fn with_order(mut self, order: Vec<TaskOrder>) -> Self {
        self.order = order;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order() {
        let order = PageRequest::parse_order("-updatedTime, priority").unwrap();
        assert_eq!(
            order,
            vec![
                TaskOrder::desc(TaskOrderField::UpdatedTime),
                TaskOrder::asc(TaskOrderField::Priority),
            ]
        );
        assert_eq!(order[0].to_sql(), "updated_time DESC");
        assert!(PageRequest::parse_order("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_order_rejects_unknown_field() {
        assert!("-payload".parse::<TaskOrder>().is_err());
    }

    #[test]
    fn test_linked_filter_conditions_skip_missing_fields() {
        let filter = LinkedTaskFilter::Retrieve {
            local_aet: Some("ARCHIVE".to_string()),
            remote_aet: None,
            destination_aet: None,
            study_iuid: Some("1.2.3".to_string()),
        };
        assert_eq!(filter.kind(), TaskKind::Retrieve);
        assert_eq!(
            filter.conditions(),
            vec![("local_aet", "ARCHIVE"), ("study_iuid", "1.2.3")]
        );
        assert!(LinkedTaskFilter::any_of(TaskKind::Diff).conditions().is_empty());
    }

    #[test]
    fn test_scheduled_on() {
        let query = TaskQuery::scheduled_on("dcm4chee-arc", "Export1");
        assert_eq!(query.owner_node.as_deref(), Some("dcm4chee-arc"));
        assert_eq!(query.queue_names, vec!["Export1".to_string()]);
        assert_eq!(query.status, Some(TaskStatus::Scheduled));
    }
}
