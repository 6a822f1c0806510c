use anyhow::{Context, Result};
use futures::TryStreamExt;
use queue_dispatcher::QueueManager;
use queue_domain::{PageRequest, TaskRecord};
use serde_json::{json, Value};

use crate::Commands;

pub async fn run(manager: &QueueManager, command: Commands) -> Result<()> {
    match command {
        Commands::Count(filter) => {
            let count = manager.count(&filter.to_query()).await?;
            print_json(&json!({ "count": count }))
        }
        Commands::List {
            filter,
            order_by,
            offset,
            limit,
        } => {
            let mut page = manager.query().page_request().with_offset(offset);
            if let Some(order_by) = order_by {
                page = page.with_order(PageRequest::parse_order(&order_by)?);
            }
            if let Some(limit) = limit {
                page = page.with_limit(limit);
            }

            let mut stream = manager.list(filter.to_query(), page);
            while let Some(record) = stream.try_next().await? {
                println!("{}", task_summary(&record));
            }
            Ok(())
        }
        Commands::Owners(filter) => {
            let owners = manager
                .query()
                .list_distinct_owners(&filter.to_query())
                .await?;
            print_json(&json!({ "owners": owners }))
        }
        Commands::Cancel { id } => {
            let canceled = manager
                .cancel(&id)
                .await
                .with_context(|| format!("取消任务 {id} 失败"))?;
            print_json(&json!({ "id": id, "canceled": canceled }))
        }
        Commands::CancelMatching(filter) => {
            let count = manager.cancel_matching(&filter.to_query()).await?;
            print_json(&json!({ "canceled": count }))
        }
        Commands::Reschedule { id, queue } => {
            match manager
                .reschedule(&id, queue.as_deref())
                .await
                .with_context(|| format!("重新调度任务 {id} 失败"))?
            {
                Some(record) => print_json(&task_summary(&record)),
                None => print_json(&json!({ "id": id, "rescheduled": false })),
            }
        }
        Commands::Delete { id } => {
            let deleted = manager.delete(&id).await?;
            print_json(&json!({ "id": id, "deleted": deleted }))
        }
        Commands::DeleteMatching { filter, limit } => {
            let query = filter.to_query();
            let count = match limit {
                Some(limit) => manager.delete_matching(&query, limit).await?,
                None => manager.deletion().delete_matching_in_batches(&query).await?,
            };
            print_json(&json!({ "deleted": count }))
        }
    }
}

fn task_summary(record: &TaskRecord) -> Value {
    json!({
        "id": record.delivery_id,
        "pk": record.pk,
        "queue": record.queue_name,
        "device": record.owner_node,
        "status": record.status,
        "priority": record.priority,
        "batchID": record.batch_id,
        "numberOfFailures": record.failure_count,
        "scheduledTime": record.scheduled_time,
        "createdTime": record.created_time,
        "updatedTime": record.updated_time,
        "errorMessage": record.error_message,
        "outcomeMessage": record.outcome_message,
        "linked": record.linked_task,
    })
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
