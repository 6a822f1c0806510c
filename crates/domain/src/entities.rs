use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use queue_errors::QueueError;
use serde::{Deserialize, Serialize};

/// 任务记录状态
///
/// ```text
/// SCHEDULED → IN_PROCESS → COMPLETED | WARNING | FAILED
///     ↓            ↓
///  CANCELED     CANCELED
/// ```
/// 失败/警告可经重试策略回到 SCHEDULED；终态只能通过重新调度或删除离开。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[serde(rename = "SCHEDULED")]
    Scheduled,
    #[serde(rename = "IN_PROCESS")]
    InProcess,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "WARNING")]
    Warning,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "CANCELED")]
    Canceled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Scheduled,
        TaskStatus::InProcess,
        TaskStatus::Completed,
        TaskStatus::Warning,
        TaskStatus::Failed,
        TaskStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Scheduled => "SCHEDULED",
            TaskStatus::InProcess => "IN_PROCESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Warning => "WARNING",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Warning | TaskStatus::Failed | TaskStatus::Canceled
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Scheduled | TaskStatus::InProcess)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| QueueError::invalid_params(format!("无效的任务状态: {s}")))
    }
}

/// 专用任务类型，每种类型对应一张独立的表
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskKind {
    #[serde(rename = "EXPORT")]
    Export,
    #[serde(rename = "RETRIEVE")]
    Retrieve,
    #[serde(rename = "DIFF")]
    Diff,
    #[serde(rename = "STGVER")]
    StorageVerification,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::Export,
        TaskKind::Retrieve,
        TaskKind::Diff,
        TaskKind::StorageVerification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Export => "EXPORT",
            TaskKind::Retrieve => "RETRIEVE",
            TaskKind::Diff => "DIFF",
            TaskKind::StorageVerification => "STGVER",
        }
    }

    /// 存储该类型专用任务的表名
    pub fn table_name(&self) -> &'static str {
        match self {
            TaskKind::Export => "export_tasks",
            TaskKind::Retrieve => "retrieve_tasks",
            TaskKind::Diff => "diff_tasks",
            TaskKind::StorageVerification => "stgver_tasks",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| QueueError::invalid_params(format!("无效的任务类型: {s}")))
    }
}

/// 任务记录关联的专用任务，最多一个
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedTask {
    pub kind: TaskKind,
    pub pk: i64,
}

/// 任务记录：一次排队提交及其执行轨迹
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub pk: i64,
    /// 消息队列分配的投递ID，每次重新调度都会变化
    pub delivery_id: String,
    pub owner_node: String,
    pub queue_name: String,
    pub status: TaskStatus,
    pub priority: i32,
    pub batch_id: Option<String>,
    pub scheduled_time: DateTime<Utc>,
    pub processing_start_time: Option<DateTime<Utc>>,
    pub processing_end_time: Option<DateTime<Utc>>,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
    pub failure_count: u32,
    pub error_message: Option<String>,
    pub outcome_message: Option<String>,
    pub payload: Vec<u8>,
    pub linked_task: Option<LinkedTask>,
}

impl TaskRecord {
    pub fn is_linked(&self) -> bool {
        self.linked_task.is_some()
    }

    /// 更新时间戳；存储层会把同一时间戳级联到关联的专用任务
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_time = now;
    }

    pub fn increment_failures(&mut self) -> u32 {
        self.failure_count += 1;
        self.failure_count
    }

    pub fn entity_description(&self) -> String {
        format!("Task[id={}] at Queue {}", self.delivery_id, self.queue_name)
    }
}

/// 待持久化的新任务记录
#[derive(Debug, Clone)]
pub struct NewTaskRecord {
    pub delivery_id: String,
    pub owner_node: String,
    pub queue_name: String,
    pub priority: i32,
    pub batch_id: Option<String>,
    pub scheduled_time: DateTime<Utc>,
    pub created_time: DateTime<Utc>,
    pub payload: Vec<u8>,
    pub linked: Option<TaskDetail>,
}

/// 专用任务：与任务记录一一对应的领域数据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecializedTask {
    pub pk: i64,
    pub task_pk: i64,
    pub created_time: DateTime<Utc>,
    pub updated_time: DateTime<Utc>,
    pub detail: TaskDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum TaskDetail {
    Export(ExportTask),
    Retrieve(RetrieveTask),
    Diff(DiffTask),
    StorageVerification(StorageVerificationTask),
}

impl TaskDetail {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskDetail::Export(_) => TaskKind::Export,
            TaskDetail::Retrieve(_) => TaskKind::Retrieve,
            TaskDetail::Diff(_) => TaskKind::Diff,
            TaskDetail::StorageVerification(_) => TaskKind::StorageVerification,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExportTask {
    pub exporter_id: String,
    pub study_iuid: String,
    pub series_iuid: Option<String>,
    pub sop_iuid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrieveTask {
    pub local_aet: String,
    pub remote_aet: String,
    pub destination_aet: String,
    pub study_iuid: String,
    pub series_iuid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiffTask {
    pub local_aet: String,
    pub primary_aet: String,
    pub secondary_aet: String,
    pub compare_fields: Option<String>,
    pub check_missing: bool,
    pub check_different: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageVerificationTask {
    pub local_aet: String,
    pub study_iuid: String,
    pub series_iuid: Option<String>,
    pub sop_iuid: Option<String>,
    pub storage_verification_policy: Option<String>,
}

/// Worker上报的处理结果状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutcomeStatus {
    Completed,
    Warning,
    Failed,
}

impl From<OutcomeStatus> for TaskStatus {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Completed => TaskStatus::Completed,
            OutcomeStatus::Warning => TaskStatus::Warning,
            OutcomeStatus::Failed => TaskStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub description: String,
}

impl Outcome {
    pub fn new<S: Into<String>>(status: OutcomeStatus, description: S) -> Self {
        Self {
            status,
            description: description.into(),
        }
    }
    pub fn completed<S: Into<String>>(description: S) -> Self {
        Self::new(OutcomeStatus::Completed, description)
    }
    pub fn warning<S: Into<String>>(description: S) -> Self {
        Self::new(OutcomeStatus::Warning, description)
    }
    pub fn failed<S: Into<String>>(description: S) -> Self {
        Self::new(OutcomeStatus::Failed, description)
    }
}

/// 投递到消息队列的任务消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskMessage {
    pub queue_name: String,
    pub batch_id: Option<String>,
    pub body: Vec<u8>,
}

impl TaskMessage {
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            queue_name: record.queue_name.clone(),
            batch_id: record.batch_id.clone(),
            body: record.payload.clone(),
        }
    }
}
