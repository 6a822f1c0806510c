use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use queue_core::DatabaseConfig;
use queue_domain::TaskStore;
use queue_errors::{QueueError, QueueResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use super::sqlite::SqliteTaskStore;

/// 嵌入式迁移脚本
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// 数据库管理器：连接池、迁移与存储实例
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> QueueResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect_with(Self::connect_options(config)?)
            .await
            .map_err(QueueError::Database)?;

        info!("已连接数据库: {}", config.url);
        Self::from_pool(pool).await
    }

    /// 启用外键约束与WAL模式，写锁冲突时按 busy_timeout 等待
    pub fn connect_options(config: &DatabaseConfig) -> QueueResult<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(QueueError::Database)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));
        Ok(options)
    }

    /// 复用已有连接池并执行迁移
    pub async fn from_pool(pool: SqlitePool) -> QueueResult<Self> {
        let manager = Self { pool };
        manager.migrate().await?;
        Ok(manager)
    }

    pub async fn migrate(&self) -> QueueResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| QueueError::DatabaseOperation(format!("执行数据库迁移失败: {e}")))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn task_store(&self) -> Arc<dyn TaskStore> {
        Arc::new(SqliteTaskStore::new(self.pool.clone()))
    }

    pub async fn health_check(&self) -> QueueResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(QueueError::Database)?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await
    }
}
