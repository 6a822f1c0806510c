use std::sync::Arc;

use queue_domain::{TaskQuery, TaskStatus, TaskStore};
use queue_infrastructure::{DatabaseManager, SqliteTaskStore};
use queue_testing_utils::{
    count_rows, memory_store, retrieve_detail, seed, seed_many, RecordingNotifier,
    TaskRecordBuilder,
};

use queue_dispatcher::deletion::DeletionManager;

async fn setup(batch_size: u64) -> (DatabaseManager, Arc<SqliteTaskStore>, RecordingNotifier, DeletionManager) {
    let (db, store) = memory_store().await.unwrap();
    let notifier = RecordingNotifier::new();
    let deletion = DeletionManager::new(store.clone(), Arc::new(notifier.clone()), batch_size);
    (db, store, notifier, deletion)
}

#[tokio::test]
async fn test_delete_linked_record_removes_both_rows() {
    let (db, store, _notifier, deletion) = setup(100).await;
    seed(store.as_ref(), TaskRecordBuilder::new("seed-1").linked_export())
        .await
        .unwrap();
    seed(store.as_ref(), TaskRecordBuilder::new("seed-2").linked_export())
        .await
        .unwrap();

    assert!(deletion.delete("seed-1").await.unwrap());

    assert_eq!(count_rows(&db, "task_records").await.unwrap(), 1);
    assert_eq!(count_rows(&db, "export_tasks").await.unwrap(), 1);
    assert!(store.find_by_delivery_id("seed-1").await.unwrap().is_none());
    assert!(store.find_by_delivery_id("seed-2").await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_bare_record_removes_one_row() {
    let (db, store, _notifier, deletion) = setup(100).await;
    seed(store.as_ref(), TaskRecordBuilder::new("seed-1"))
        .await
        .unwrap();
    seed(
        store.as_ref(),
        TaskRecordBuilder::new("seed-2").linked(retrieve_detail("PACS", "1.2.3")),
    )
    .await
    .unwrap();

    assert!(deletion.delete("seed-1").await.unwrap());

    assert_eq!(count_rows(&db, "task_records").await.unwrap(), 1);
    assert_eq!(count_rows(&db, "retrieve_tasks").await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_missing_record_returns_false() {
    let (_db, _store, notifier, deletion) = setup(100).await;
    assert!(!deletion.delete("missing").await.unwrap());
    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn test_delete_in_process_record_notifies() {
    let (_db, store, notifier, deletion) = setup(100).await;
    let running = seed(
        store.as_ref(),
        TaskRecordBuilder::new("seed-1").with_status(TaskStatus::InProcess),
    )
    .await
    .unwrap();
    seed(store.as_ref(), TaskRecordBuilder::new("seed-2"))
        .await
        .unwrap();

    assert!(deletion.delete("seed-1").await.unwrap());
    assert!(deletion.delete("seed-2").await.unwrap());

    assert_eq!(notifier.canceled_pks(), vec![running.pk]);
}

#[tokio::test]
async fn test_delete_matching_respects_limit() {
    let (_db, store, _notifier, deletion) = setup(100).await;
    let builders = (0..5)
        .map(|i| TaskRecordBuilder::new(&format!("seed-{i}")).with_status(TaskStatus::Completed))
        .chain((5..7).map(|i| TaskRecordBuilder::new(&format!("seed-{i}"))))
        .collect();
    seed_many(store.as_ref(), builders).await.unwrap();

    let query = TaskQuery::new().status(TaskStatus::Completed);
    assert_eq!(deletion.delete_matching(&query, 3).await.unwrap(), 3);

    let remaining = store
        .list_delivery_ids(&TaskQuery::new(), &[], None)
        .await
        .unwrap();
    assert_eq!(remaining, vec!["seed-3", "seed-4", "seed-5", "seed-6"]);

    assert_eq!(deletion.delete_matching(&query, 0).await.unwrap(), 0);
    assert_eq!(deletion.delete_matching(&query, 10).await.unwrap(), 2);
    assert_eq!(store.count(&query).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_matching_removes_linked_rows_and_notifies_in_process() {
    let (db, store, notifier, deletion) = setup(100).await;
    let running = seed(
        store.as_ref(),
        TaskRecordBuilder::new("seed-1")
            .with_status(TaskStatus::InProcess)
            .linked_export(),
    )
    .await
    .unwrap();
    seed(store.as_ref(), TaskRecordBuilder::new("seed-2").linked_export())
        .await
        .unwrap();

    let deleted = deletion
        .delete_matching(&TaskQuery::new().queue_name("Export1"), 10)
        .await
        .unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(count_rows(&db, "task_records").await.unwrap(), 0);
    assert_eq!(count_rows(&db, "export_tasks").await.unwrap(), 0);
    assert_eq!(notifier.canceled_pks(), vec![running.pk]);
}

#[tokio::test]
async fn test_delete_matching_in_batches_drains_all_matches() {
    let (_db, store, _notifier, deletion) = setup(2).await;
    let builders = (0..5)
        .map(|i| TaskRecordBuilder::new(&format!("seed-{i}")).with_batch_id("batch-1"))
        .chain(std::iter::once(
            TaskRecordBuilder::new("other").with_batch_id("batch-2"),
        ))
        .collect();
    seed_many(store.as_ref(), builders).await.unwrap();

    let deleted = deletion
        .delete_matching_in_batches(&TaskQuery::new().batch_id("batch-1"))
        .await
        .unwrap();

    assert_eq!(deleted, 5);
    assert_eq!(
        store
            .list_delivery_ids(&TaskQuery::new(), &[], None)
            .await
            .unwrap(),
        vec!["other"]
    );
}
