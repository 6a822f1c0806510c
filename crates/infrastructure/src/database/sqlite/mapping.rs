use queue_domain::{
    DiffTask, ExportTask, LinkedTask, RetrieveTask, SpecializedTask, StorageVerificationTask,
    TaskDetail, TaskKind, TaskRecord,
};
use queue_errors::{QueueError, QueueResult};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

pub fn row_to_task_record(row: &SqliteRow) -> QueueResult<TaskRecord> {
    let linked_kind: Option<TaskKind> = row.try_get("linked_kind")?;
    let linked_pk: Option<i64> = row.try_get("linked_pk")?;
    let failure_count: i64 = row.try_get("failure_count")?;

    Ok(TaskRecord {
        pk: row.try_get("pk")?,
        delivery_id: row.try_get("delivery_id")?,
        owner_node: row.try_get("owner_node")?,
        queue_name: row.try_get("queue_name")?,
        status: row.try_get("status")?,
        priority: row.try_get("priority")?,
        batch_id: row.try_get("batch_id")?,
        scheduled_time: row.try_get("scheduled_time")?,
        processing_start_time: row.try_get("processing_start_time")?,
        processing_end_time: row.try_get("processing_end_time")?,
        created_time: row.try_get("created_time")?,
        updated_time: row.try_get("updated_time")?,
        failure_count: u32::try_from(failure_count).unwrap_or(u32::MAX),
        error_message: row.try_get("error_message")?,
        outcome_message: row.try_get("outcome_message")?,
        payload: row.try_get("payload")?,
        linked_task: match (linked_kind, linked_pk) {
            (Some(kind), Some(pk)) => Some(LinkedTask { kind, pk }),
            _ => None,
        },
    })
}

pub fn specialized_select(kind: TaskKind) -> String {
    let columns = match kind {
        TaskKind::Export => "exporter_id, study_iuid, series_iuid, sop_iuid",
        TaskKind::Retrieve => "local_aet, remote_aet, destination_aet, study_iuid, series_iuid",
        TaskKind::Diff => {
            "local_aet, primary_aet, secondary_aet, compare_fields, check_missing, check_different"
        }
        TaskKind::StorageVerification => {
            "local_aet, study_iuid, series_iuid, sop_iuid, storage_verification_policy"
        }
    };
    format!(
        "SELECT pk, task_pk, created_time, updated_time, {columns} FROM {} WHERE pk = ?",
        kind.table_name()
    )
}

pub fn row_to_specialized_task(kind: TaskKind, row: &SqliteRow) -> QueueResult<SpecializedTask> {
    let detail = match kind {
        TaskKind::Export => TaskDetail::Export(ExportTask {
            exporter_id: row.try_get("exporter_id")?,
            study_iuid: row.try_get("study_iuid")?,
            series_iuid: row.try_get("series_iuid")?,
            sop_iuid: row.try_get("sop_iuid")?,
        }),
        TaskKind::Retrieve => TaskDetail::Retrieve(RetrieveTask {
            local_aet: row.try_get("local_aet")?,
            remote_aet: row.try_get("remote_aet")?,
            destination_aet: row.try_get("destination_aet")?,
            study_iuid: row.try_get("study_iuid")?,
            series_iuid: row.try_get("series_iuid")?,
        }),
        TaskKind::Diff => TaskDetail::Diff(DiffTask {
            local_aet: row.try_get("local_aet")?,
            primary_aet: row.try_get("primary_aet")?,
            secondary_aet: row.try_get("secondary_aet")?,
            compare_fields: row.try_get("compare_fields")?,
            check_missing: row.try_get("check_missing")?,
            check_different: row.try_get("check_different")?,
        }),
        TaskKind::StorageVerification => TaskDetail::StorageVerification(StorageVerificationTask {
            local_aet: row.try_get("local_aet")?,
            study_iuid: row.try_get("study_iuid")?,
            series_iuid: row.try_get("series_iuid")?,
            sop_iuid: row.try_get("sop_iuid")?,
            storage_verification_policy: row.try_get("storage_verification_policy")?,
        }),
    };

    Ok(SpecializedTask {
        pk: row.try_get("pk")?,
        task_pk: row.try_get("task_pk")?,
        created_time: row.try_get("created_time")?,
        updated_time: row.try_get("updated_time")?,
        detail,
    })
}

pub fn count_from_row(row: &SqliteRow) -> QueueResult<u64> {
    let count: i64 = row.try_get(0)?;
    u64::try_from(count).map_err(|e| QueueError::DatabaseOperation(format!("无效的计数结果: {e}")))
}
