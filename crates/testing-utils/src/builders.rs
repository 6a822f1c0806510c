//! Test data builders for task records

use chrono::{DateTime, Utc};
use queue_domain::{
    DiffTask, ExportTask, NewTaskRecord, RetrieveTask, StorageVerificationTask, TaskDetail,
    TaskStatus,
};

pub const TEST_DEVICE: &str = "dcm4chee-arc";

/// 构建待写入存储的任务记录，可附带插入后要设置的状态
#[derive(Debug, Clone)]
pub struct TaskRecordBuilder {
    pub record: NewTaskRecord,
    pub status: TaskStatus,
    pub failure_count: u32,
    pub error_message: Option<String>,
    pub outcome_message: Option<String>,
}

impl TaskRecordBuilder {
    pub fn new(delivery_id: &str) -> Self {
        let now = Utc::now();
        Self {
            record: NewTaskRecord {
                delivery_id: delivery_id.to_string(),
                owner_node: TEST_DEVICE.to_string(),
                queue_name: "Export1".to_string(),
                priority: 4,
                batch_id: None,
                scheduled_time: now,
                created_time: now,
                payload: format!("{{\"id\":\"{delivery_id}\"}}").into_bytes(),
                linked: None,
            },
            status: TaskStatus::Scheduled,
            failure_count: 0,
            error_message: None,
            outcome_message: None,
        }
    }

    pub fn with_queue(mut self, queue_name: &str) -> Self {
        self.record.queue_name = queue_name.to_string();
        self
    }

    pub fn with_owner(mut self, owner_node: &str) -> Self {
        self.record.owner_node = owner_node.to_string();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.record.priority = priority;
        self
    }

    pub fn with_batch_id(mut self, batch_id: &str) -> Self {
        self.record.batch_id = Some(batch_id.to_string());
        self
    }

    pub fn with_created_time(mut self, created_time: DateTime<Utc>) -> Self {
        self.record.created_time = created_time;
        self.record.scheduled_time = created_time;
        self
    }

    pub fn with_payload(mut self, payload: &[u8]) -> Self {
        self.record.payload = payload.to_vec();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_failures(mut self, failure_count: u32) -> Self {
        self.failure_count = failure_count;
        self
    }

    pub fn with_error(mut self, error_message: &str) -> Self {
        self.error_message = Some(error_message.to_string());
        self
    }

    pub fn with_outcome(mut self, outcome_message: &str) -> Self {
        self.outcome_message = Some(outcome_message.to_string());
        self
    }

    pub fn linked(mut self, detail: TaskDetail) -> Self {
        self.record.linked = Some(detail);
        self
    }

    pub fn linked_export(self) -> Self {
        self.linked(export_detail("STORESCU", "1.2.840.10008.1"))
    }

    pub fn linked_retrieve(self) -> Self {
        self.linked(retrieve_detail("PACS", "1.2.840.10008.1"))
    }
}

pub fn export_detail(exporter_id: &str, study_iuid: &str) -> TaskDetail {
    TaskDetail::Export(ExportTask {
        exporter_id: exporter_id.to_string(),
        study_iuid: study_iuid.to_string(),
        series_iuid: None,
        sop_iuid: None,
    })
}

pub fn retrieve_detail(remote_aet: &str, study_iuid: &str) -> TaskDetail {
    TaskDetail::Retrieve(RetrieveTask {
        local_aet: "DCM4CHEE".to_string(),
        remote_aet: remote_aet.to_string(),
        destination_aet: "DCM4CHEE".to_string(),
        study_iuid: study_iuid.to_string(),
        series_iuid: None,
    })
}

pub fn diff_detail(primary_aet: &str, secondary_aet: &str) -> TaskDetail {
    TaskDetail::Diff(DiffTask {
        local_aet: "DCM4CHEE".to_string(),
        primary_aet: primary_aet.to_string(),
        secondary_aet: secondary_aet.to_string(),
        compare_fields: None,
        check_missing: true,
        check_different: false,
    })
}

pub fn stgver_detail(study_iuid: &str) -> TaskDetail {
    TaskDetail::StorageVerification(StorageVerificationTask {
        local_aet: "DCM4CHEE".to_string(),
        study_iuid: study_iuid.to_string(),
        series_iuid: None,
        sop_iuid: None,
        storage_verification_policy: Some("OBJECT_CHECKSUM".to_string()),
    })
}
