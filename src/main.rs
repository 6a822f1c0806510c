use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use queue_core::{init_logging, AppConfig, QueueRegistry};
use queue_dispatcher::QueueManager;
use queue_domain::{TaskQuery, TaskStatus};
use queue_infrastructure::{BroadcastCancellationNotifier, BrokerFactory, DatabaseManager};
use tracing::info;

mod commands;

/// 任务队列运维工具
#[derive(Parser, Debug)]
#[command(name = "queue-admin")]
#[command(version = "1.0.0")]
#[command(about = "影像归档任务队列 - 命令行运维工具")]
#[command(long_about = "查询、取消、重新调度与清理任务队列中的任务记录")]
struct CliApp {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径，缺省时按默认路径查找
    #[arg(short, long)]
    config: Option<String>,

    /// 覆盖配置中的日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 统计匹配的任务数
    Count(FilterArgs),
    /// 列出匹配的任务
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// 排序，例如 `-updatedTime,priority`
        #[arg(long)]
        order_by: Option<String>,
        /// 跳过的记录数
        #[arg(long, default_value = "0")]
        offset: u64,
        /// 最多返回的记录数
        #[arg(long)]
        limit: Option<u64>,
    },
    /// 列出匹配任务所属的设备
    Owners(FilterArgs),
    /// 取消单个任务
    Cancel {
        /// 任务投递ID
        id: String,
    },
    /// 批量取消匹配的任务（不发送取消通知）
    CancelMatching(FilterArgs),
    /// 重新调度单个任务
    Reschedule {
        /// 任务投递ID
        id: String,
        /// 迁移到的新队列
        #[arg(short, long)]
        queue: Option<String>,
    },
    /// 删除单个任务
    Delete {
        /// 任务投递ID
        id: String,
    },
    /// 批量删除匹配的任务
    DeleteMatching {
        #[command(flatten)]
        filter: FilterArgs,
        /// 本次最多删除的记录数，缺省时按配置的批次大小删除全部
        #[arg(long)]
        limit: Option<u64>,
    },
}

/// 通用过滤条件
#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// 所属设备名称
    #[arg(long)]
    device: Option<String>,
    /// 队列名称，可重复
    #[arg(long)]
    queue: Vec<String>,
    /// 任务状态，例如 SCHEDULED、IN_PROCESS
    #[arg(long)]
    status: Option<TaskStatus>,
    /// 批次ID
    #[arg(long)]
    batch_id: Option<String>,
}

impl FilterArgs {
    fn to_query(&self) -> TaskQuery {
        let mut query = TaskQuery::new();
        if let Some(device) = &self.device {
            query = query.owner_node(device.as_str());
        }
        for queue in &self.queue {
            query = query.queue_name(queue.as_str());
        }
        if let Some(status) = self.status {
            query = query.status(status);
        }
        if let Some(batch_id) = &self.batch_id {
            query = query.batch_id(batch_id.as_str());
        }
        query
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliApp::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("加载配置失败")?;
    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level);
    init_logging(log_level, &config.observability.log_format)?;

    let database = DatabaseManager::new(&config.database)
        .await
        .context("连接任务数据库失败")?;
    let broker = BrokerFactory::create(&config.message_queue)
        .await
        .context("创建消息代理失败")?;
    let manager = QueueManager::new(
        database.task_store(),
        broker,
        Arc::new(BroadcastCancellationNotifier::default()),
        Arc::new(QueueRegistry::from_config(&config)),
        &config.manager,
    );
    info!("设备 {} 上的队列管理器已就绪", config.manager.device_name);

    let result = commands::run(&manager, cli.command).await;
    database.close().await;
    result
}
