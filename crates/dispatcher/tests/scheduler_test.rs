use std::sync::Arc;
use std::time::Duration;

use queue_core::QueueRegistry;
use queue_domain::{QueueDescriptor, TaskKind, TaskQuery, TaskStatus, TaskStore};
use queue_errors::QueueError;
use queue_infrastructure::{DatabaseManager, SqliteTaskStore};
use queue_testing_utils::{
    export_detail, memory_store, seed, MockBroker, TaskRecordBuilder, TEST_DEVICE,
};

use queue_dispatcher::scheduler::{ScheduleRequest, Scheduler};

async fn setup(descriptor: QueueDescriptor) -> (DatabaseManager, Arc<SqliteTaskStore>, MockBroker, Scheduler) {
    let (manager, store) = memory_store().await.unwrap();
    let broker = MockBroker::new();
    let registry = QueueRegistry::new().with_descriptor(descriptor);
    let scheduler = Scheduler::new(
        store.clone(),
        Arc::new(broker.clone()),
        Arc::new(registry),
        TEST_DEVICE.to_string(),
    );
    (manager, store, broker, scheduler)
}

#[tokio::test]
async fn test_schedule_sends_then_persists_record() {
    let (_db, store, broker, scheduler) =
        setup(QueueDescriptor::new("Export1", "jms/queue/Export1")).await;

    let request = ScheduleRequest::new("Export1", b"{\"study\":\"1.2.3\"}".to_vec())
        .with_priority(6)
        .with_batch_id("batch-1")
        .with_linked(export_detail("STORESCU", "1.2.3"));
    let record = scheduler.schedule(request).await.unwrap();

    assert_eq!(record.delivery_id, "msg-1");
    assert_eq!(record.status, TaskStatus::Scheduled);
    assert_eq!(record.owner_node, TEST_DEVICE);
    assert_eq!(record.priority, 6);
    assert_eq!(record.failure_count, 0);
    assert_eq!(record.batch_id.as_deref(), Some("batch-1"));

    let sent = broker.last_sent().unwrap();
    assert_eq!(sent.destination, "jms/queue/Export1");
    assert_eq!(sent.priority, 6);
    assert_eq!(sent.delay, Duration::ZERO);
    assert_eq!(sent.message.body, b"{\"study\":\"1.2.3\"}".to_vec());
    assert_eq!(sent.message.batch_id.as_deref(), Some("batch-1"));

    let stored = store.find_by_delivery_id("msg-1").await.unwrap().unwrap();
    assert_eq!(stored.pk, record.pk);
    let linked = stored.linked_task.unwrap();
    assert_eq!(linked.kind, TaskKind::Export);
    let specialized = store.find_linked_task(linked).await.unwrap().unwrap();
    assert_eq!(specialized.detail, export_detail("STORESCU", "1.2.3"));
}

#[tokio::test]
async fn test_schedule_with_delay_sets_scheduled_time() {
    let (_db, _store, broker, scheduler) =
        setup(QueueDescriptor::new("Export1", "Export1")).await;

    let record = scheduler
        .schedule(ScheduleRequest::new("Export1", vec![1, 2, 3]).with_delay(Duration::from_secs(30)))
        .await
        .unwrap();

    assert_eq!(
        record.scheduled_time - record.created_time,
        chrono::Duration::seconds(30)
    );
    assert_eq!(broker.last_sent().unwrap().delay, Duration::from_secs(30));
}

#[tokio::test]
async fn test_backpressure_rejects_when_queue_is_full() {
    let (_db, store, broker, scheduler) =
        setup(QueueDescriptor::new("Export1", "Export1").with_max_queue_size(2)).await;

    scheduler
        .schedule(ScheduleRequest::new("Export1", vec![1]))
        .await
        .unwrap();
    scheduler
        .schedule(ScheduleRequest::new("Export1", vec![2]))
        .await
        .unwrap();

    let result = scheduler
        .schedule(ScheduleRequest::new("Export1", vec![3]))
        .await;
    match result {
        Err(QueueError::QueueSizeLimitExceeded {
            queue_name,
            max_queue_size,
        }) => {
            assert_eq!(queue_name, "Export1");
            assert_eq!(max_queue_size, 2);
        }
        other => panic!("expected QueueSizeLimitExceeded, got {other:?}"),
    }

    assert_eq!(broker.sent_count(), 2);
    assert_eq!(store.count(&TaskQuery::new()).await.unwrap(), 2);
    assert_eq!(scheduler.count_scheduled("Export1").await.unwrap(), 2);
}

#[tokio::test]
async fn test_backpressure_counts_only_scheduled_on_this_device() {
    let (_db, store, _broker, scheduler) =
        setup(QueueDescriptor::new("Export1", "Export1").with_max_queue_size(1)).await;

    seed(
        store.as_ref(),
        TaskRecordBuilder::new("seed-1").with_owner("archive-2"),
    )
    .await
    .unwrap();
    seed(
        store.as_ref(),
        TaskRecordBuilder::new("seed-2").with_status(TaskStatus::InProcess),
    )
    .await
    .unwrap();
    seed(
        store.as_ref(),
        TaskRecordBuilder::new("seed-3").with_queue("Export2"),
    )
    .await
    .unwrap();

    assert_eq!(scheduler.count_scheduled("Export1").await.unwrap(), 0);
    scheduler
        .schedule(ScheduleRequest::new("Export1", vec![1]))
        .await
        .unwrap();
    assert!(matches!(
        scheduler
            .schedule(ScheduleRequest::new("Export1", vec![2]))
            .await,
        Err(QueueError::QueueSizeLimitExceeded { .. })
    ));
}

#[tokio::test]
async fn test_unbounded_queue_accepts_any_number() {
    let (_db, store, _broker, scheduler) =
        setup(QueueDescriptor::new("Export1", "Export1")).await;

    for i in 0..5u8 {
        scheduler
            .schedule(ScheduleRequest::new("Export1", vec![i]))
            .await
            .unwrap();
    }
    assert_eq!(store.count(&TaskQuery::new()).await.unwrap(), 5);
}

#[tokio::test]
async fn test_unknown_queue_is_rejected() {
    let (_db, store, broker, scheduler) =
        setup(QueueDescriptor::new("Export1", "Export1")).await;

    let result = scheduler
        .schedule(ScheduleRequest::new("Retrieve1", vec![1]))
        .await;

    assert!(matches!(result, Err(QueueError::QueueNotConfigured { .. })));
    assert_eq!(broker.sent_count(), 0);
    assert_eq!(store.count(&TaskQuery::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_broker_failure_creates_no_record() {
    let (_db, store, broker, scheduler) =
        setup(QueueDescriptor::new("Export1", "Export1")).await;
    broker.fail_sends(true);

    let result = scheduler
        .schedule(ScheduleRequest::new("Export1", vec![1]))
        .await;

    assert!(matches!(result, Err(QueueError::MessageQueue(_))));
    assert_eq!(store.count(&TaskQuery::new()).await.unwrap(), 0);
}
