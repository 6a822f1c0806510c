use std::sync::Arc;

use queue_core::ManagerConfig;
use queue_domain::{
    CancellationNotifier, LinkedTaskFilter, MessageBroker, Outcome, PageRequest, QueueConfigSource,
    TaskQuery, TaskRecord, TaskStore, TaskStream,
};
use queue_errors::QueueResult;

use crate::cancellation::CancellationManager;
use crate::deletion::DeletionManager;
use crate::execution_tracker::{ExecutionListener, ExecutionTracker};
use crate::query_service::TaskQueryService;
use crate::scheduler::{ScheduleRequest, Scheduler};

/// 队列管理器：把调度、状态跟踪、取消、删除与查询组装在同一组端口之上
pub struct QueueManager {
    scheduler: Arc<Scheduler>,
    tracker: Arc<ExecutionTracker>,
    cancellation: CancellationManager,
    deletion: DeletionManager,
    query: TaskQueryService,
}

impl QueueManager {
    pub fn new(
        store: Arc<dyn TaskStore>,
        broker: Arc<dyn MessageBroker>,
        notifier: Arc<dyn CancellationNotifier>,
        queues: Arc<dyn QueueConfigSource>,
        config: &ManagerConfig,
    ) -> Self {
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            broker,
            queues,
            config.device_name.clone(),
        ));
        let tracker = Arc::new(ExecutionTracker::new(
            store.clone(),
            scheduler.clone(),
            notifier.clone(),
        ));
        Self {
            cancellation: CancellationManager::new(store.clone(), tracker.clone()),
            deletion: DeletionManager::new(store.clone(), notifier, config.delete_task_fetch_size),
            query: TaskQueryService::new(store, config.query_fetch_size),
            scheduler,
            tracker,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn tracker(&self) -> Arc<ExecutionTracker> {
        self.tracker.clone()
    }

    pub fn cancellation(&self) -> &CancellationManager {
        &self.cancellation
    }

    pub fn deletion(&self) -> &DeletionManager {
        &self.deletion
    }

    pub fn query(&self) -> &TaskQueryService {
        &self.query
    }

    pub async fn schedule(&self, request: ScheduleRequest) -> QueueResult<TaskRecord> {
        self.scheduler.schedule(request).await
    }

    pub async fn on_start(&self, delivery_id: &str) -> QueueResult<Option<TaskRecord>> {
        self.tracker.on_start(delivery_id).await
    }

    pub async fn on_success(
        &self,
        delivery_id: &str,
        outcome: Outcome,
    ) -> QueueResult<Option<TaskRecord>> {
        self.tracker.on_success(delivery_id, outcome).await
    }

    pub async fn on_failure(&self, delivery_id: &str, error: &str) -> QueueResult<Option<TaskRecord>> {
        self.tracker.on_failure(delivery_id, error).await
    }

    pub async fn cancel(&self, delivery_id: &str) -> QueueResult<bool> {
        self.cancellation.cancel(delivery_id).await
    }

    pub async fn cancel_matching(&self, query: &TaskQuery) -> QueueResult<u64> {
        self.cancellation.cancel_matching(query).await
    }

    pub async fn cancel_matching_linked(
        &self,
        query: &TaskQuery,
        filter: LinkedTaskFilter,
    ) -> QueueResult<u64> {
        self.cancellation.cancel_matching_linked(query, filter).await
    }

    pub async fn reschedule(
        &self,
        delivery_id: &str,
        queue_name: Option<&str>,
    ) -> QueueResult<Option<TaskRecord>> {
        self.tracker.reschedule(delivery_id, queue_name).await
    }

    pub async fn delete(&self, delivery_id: &str) -> QueueResult<bool> {
        self.deletion.delete(delivery_id).await
    }

    pub async fn delete_matching(&self, query: &TaskQuery, limit: u64) -> QueueResult<u64> {
        self.deletion.delete_matching(query, limit).await
    }

    pub async fn count(&self, query: &TaskQuery) -> QueueResult<u64> {
        self.query.count(query).await
    }

    pub fn list(&self, query: TaskQuery, page: PageRequest) -> TaskStream {
        self.query.list(query, page)
    }
}
