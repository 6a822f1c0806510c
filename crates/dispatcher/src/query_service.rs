use std::sync::Arc;

use tracing::debug;

use queue_domain::{
    LinkedTask, PageRequest, SpecializedTask, TaskOrder, TaskQuery, TaskRecord, TaskStore,
    TaskStream,
};
use queue_errors::QueueResult;

/// 任务查询服务
pub struct TaskQueryService {
    store: Arc<dyn TaskStore>,
    fetch_size: u32,
}

impl TaskQueryService {
    pub fn new(store: Arc<dyn TaskStore>, fetch_size: u32) -> Self {
        Self {
            store,
            fetch_size: fetch_size.max(1),
        }
    }

    /// 以配置的分页大小作为默认值的分页参数
    pub fn page_request(&self) -> PageRequest {
        PageRequest::default().with_fetch_size(self.fetch_size)
    }

    pub async fn count(&self, query: &TaskQuery) -> QueueResult<u64> {
        self.store.count(query).await
    }

    pub async fn list_ids(&self, query: &TaskQuery, limit: Option<u64>) -> QueueResult<Vec<String>> {
        self.store.list_delivery_ids(query, &[], limit).await
    }

    pub async fn list_ids_ordered(
        &self,
        query: &TaskQuery,
        order: &[TaskOrder],
        limit: Option<u64>,
    ) -> QueueResult<Vec<String>> {
        self.store.list_delivery_ids(query, order, limit).await
    }

    pub async fn list_distinct_owners(&self, query: &TaskQuery) -> QueueResult<Vec<String>> {
        self.store.list_distinct_owners(query).await
    }

    /// 惰性的只进流；丢弃流即释放连接
    pub fn list(&self, query: TaskQuery, page: PageRequest) -> TaskStream {
        debug!(
            "流式查询任务，偏移 {}，上限 {:?}，每页 {}",
            page.offset, page.limit, page.fetch_size
        );
        self.store.stream(query, page)
    }

    pub async fn find(&self, delivery_id: &str) -> QueueResult<Option<TaskRecord>> {
        self.store.find_by_delivery_id(delivery_id).await
    }

    /// 记录所属的设备名称
    pub async fn find_owner(&self, delivery_id: &str) -> QueueResult<Option<String>> {
        self.store.find_owner_by_delivery_id(delivery_id).await
    }

    pub async fn find_linked_task(&self, linked: LinkedTask) -> QueueResult<Option<SpecializedTask>> {
        self.store.find_linked_task(linked).await
    }
}
