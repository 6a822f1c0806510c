use std::sync::Arc;
use std::time::Duration;

use queue_core::{AppConfig, QueueRegistry};
use queue_domain::{Outcome, TaskMessage, TaskQuery, TaskStatus};
use queue_infrastructure::{BroadcastCancellationNotifier, DatabaseManager, InMemoryBroker};
use queue_testing_utils::{export_detail, memory_database};

use queue_dispatcher::{QueueManager, ScheduleRequest};

const CONFIG: &str = r#"
[manager]
device_name = "dcm4chee-arc"
query_fetch_size = 2
delete_task_fetch_size = 2

[[queues]]
name = "Export1"
destination = "jms/queue/Export1"
max_queue_size = 3
retry_delay_seconds = 1
max_number_of_retries = 1
"#;

struct Engine {
    _db: DatabaseManager,
    broker: InMemoryBroker,
    notifier: BroadcastCancellationNotifier,
    manager: QueueManager,
}

async fn engine() -> Engine {
    let config = AppConfig::from_toml(CONFIG).unwrap();
    let db = memory_database().await.unwrap();
    let broker = InMemoryBroker::new(16);
    let notifier = BroadcastCancellationNotifier::new(16);
    let manager = QueueManager::new(
        db.task_store(),
        Arc::new(broker.clone()),
        Arc::new(notifier.clone()),
        Arc::new(QueueRegistry::from_config(&config)),
        &config.manager,
    );
    Engine {
        _db: db,
        broker,
        notifier,
        manager,
    }
}

#[tokio::test]
async fn test_task_lifecycle_through_in_memory_broker() {
    let e = engine().await;

    let record = e
        .manager
        .schedule(
            ScheduleRequest::new("Export1", b"study=1.2.3".to_vec())
                .with_linked(export_detail("STORESCU", "1.2.3")),
        )
        .await
        .unwrap();

    let delivery = e
        .broker
        .try_receive("jms/queue/Export1")
        .await
        .unwrap();
    assert_eq!(delivery.delivery_id, record.delivery_id);
    assert_eq!(
        delivery.message,
        TaskMessage {
            queue_name: "Export1".to_string(),
            batch_id: None,
            body: b"study=1.2.3".to_vec(),
        }
    );

    let started = e
        .manager
        .on_start(&delivery.delivery_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(started.status, TaskStatus::InProcess);

    let finished = e
        .manager
        .on_success(&delivery.delivery_id, Outcome::completed("exported"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(finished.status, TaskStatus::Completed);
    assert_eq!(
        e.manager
            .count(&TaskQuery::new().status(TaskStatus::Completed))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_retry_redelivers_after_delay() {
    let e = engine().await;
    e.manager
        .schedule(ScheduleRequest::new("Export1", vec![1]))
        .await
        .unwrap();
    let first = e.broker.try_receive("jms/queue/Export1").await.unwrap();

    e.manager.on_start(&first.delivery_id).await.unwrap();
    let retried = e
        .manager
        .on_failure(&first.delivery_id, "association rejected")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(retried.status, TaskStatus::Scheduled);
    assert_eq!(retried.failure_count, 1);

    let second = e
        .broker
        .receive("jms/queue/Export1", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(second.delivery_id, retried.delivery_id);

    e.manager.on_start(&second.delivery_id).await.unwrap();
    let failed = e
        .manager
        .on_failure(&second.delivery_id, "association rejected")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.failure_count, 2);
}

#[tokio::test]
async fn test_cancel_reaches_subscribers() {
    let e = engine().await;
    let mut canceled = e.notifier.subscribe();

    let record = e
        .manager
        .schedule(ScheduleRequest::new("Export1", vec![1]))
        .await
        .unwrap();
    e.manager.on_start(&record.delivery_id).await.unwrap();

    assert!(e.manager.cancel(&record.delivery_id).await.unwrap());
    let event = canceled.recv().await.unwrap();
    assert_eq!(event.task_pk, record.pk);
    assert_eq!(event.delivery_id, record.delivery_id);
}

#[tokio::test]
async fn test_backpressure_and_bulk_operations() {
    let e = engine().await;
    for i in 0..3u8 {
        e.manager
            .schedule(ScheduleRequest::new("Export1", vec![i]).with_batch_id("batch-1"))
            .await
            .unwrap();
    }
    assert!(e
        .manager
        .schedule(ScheduleRequest::new("Export1", vec![9]))
        .await
        .is_err());
    assert_eq!(e.manager.scheduler().count_scheduled("Export1").await.unwrap(), 3);

    let batch = TaskQuery::new().batch_id("batch-1");
    assert_eq!(e.manager.cancel_matching(&batch).await.unwrap(), 3);
    assert_eq!(e.manager.scheduler().count_scheduled("Export1").await.unwrap(), 0);

    let ids = e.manager.query().list_ids(&batch, None).await.unwrap();
    let rescheduled = e
        .manager
        .reschedule(&ids[0], None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rescheduled.status, TaskStatus::Scheduled);

    assert_eq!(
        e.manager
            .deletion()
            .delete_matching_in_batches(&TaskQuery::new().status(TaskStatus::Canceled))
            .await
            .unwrap(),
        2
    );
    assert_eq!(e.manager.count(&TaskQuery::new()).await.unwrap(), 1);
    assert!(e.manager.delete(&rescheduled.delivery_id).await.unwrap());
    assert_eq!(e.manager.count(&TaskQuery::new()).await.unwrap(), 0);
}
