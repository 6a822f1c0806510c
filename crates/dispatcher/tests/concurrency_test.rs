use std::sync::Arc;

use queue_core::{DatabaseConfig, QueueRegistry};
use queue_domain::{QueueDescriptor, TaskQuery, TaskStatus, TaskStore};
use queue_infrastructure::DatabaseManager;
use queue_testing_utils::{seed_many, MockBroker, RecordingNotifier, TaskRecordBuilder, TEST_DEVICE};

use queue_dispatcher::execution_tracker::{ExecutionListener, ExecutionTracker};
use queue_dispatcher::scheduler::Scheduler;

const TASKS: usize = 40;

/// 文件数据库 + 多连接池，和生产配置一致
async fn file_database(dir: &tempfile::TempDir) -> DatabaseManager {
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("queue.db").display()),
        max_connections: 8,
        ..Default::default()
    };
    DatabaseManager::new(&config).await.unwrap()
}

fn tracker(store: Arc<dyn TaskStore>) -> Arc<ExecutionTracker> {
    let registry = QueueRegistry::new().with_descriptor(QueueDescriptor::new("Export1", "Export1"));
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        Arc::new(MockBroker::new()),
        Arc::new(registry),
        TEST_DEVICE.to_string(),
    ));
    Arc::new(ExecutionTracker::new(
        store,
        scheduler,
        Arc::new(RecordingNotifier::new()),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callbacks_on_different_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_database(&dir).await;
    let store = db.task_store();
    let builders = (0..TASKS)
        .map(|i| TaskRecordBuilder::new(&format!("msg-{i}")))
        .collect();
    seed_many(store.as_ref(), builders).await.unwrap();
    let tracker = tracker(store.clone());

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.on_start(&format!("msg-{i}")).await })
        })
        .collect();
    for handle in handles {
        let started = handle.await.unwrap().unwrap().unwrap();
        assert_eq!(started.status, TaskStatus::InProcess);
    }

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    tracker.cancel(&format!("msg-{i}")).await.map(|_| ())
                } else {
                    tracker.on_failure(&format!("msg-{i}"), "timeout").await.map(|_| ())
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(
        store
            .count(&TaskQuery::new().status(TaskStatus::Canceled))
            .await
            .unwrap(),
        (TASKS / 2) as u64
    );
    assert_eq!(
        store
            .count(&TaskQuery::new().status(TaskStatus::Failed))
            .await
            .unwrap(),
        (TASKS / 2) as u64
    );
    db.close().await;
}
