// ==========================================
// 生产排程系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 一个 AppState 持有一条数据库连接；同一数据库文件可被多个 AppState
//       （多进程/多连接）同时打开，写事务由 SQLite 串行化
// ==========================================

use std::sync::Arc;

use crate::api::ProductionApi;
use crate::config::config_manager::ConfigManager;
use crate::engine::{
    AllocationLedger, CompletionRecorder, DetailExplosion, InventoryGateway, ItemLifecycle,
    OptionalEventPublisher, ProductionEventPublisher, ScheduleAggregate, SqliteInventoryLedger,
};
use crate::repository::{
    ActionLogRepository, ProductionAllocationRepository, ProductionCompletionRepository,
    ProductionDetailRepository, ProductionItemRepository, ReferenceDataRepository,
    ScheduleRepository, ScheduleStore,
};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "PRODUCTION_SCHEDULING_DB";

/// 应用状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 生产排程API
    pub production_api: Arc<ProductionApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 参考数据仓储（主数据同步）
    pub reference_repo: Arc<ReferenceDataRepository>,

    /// 操作日志仓储
    pub action_log_repo: Arc<ActionLogRepository>,

    /// 记录存储
    pub store: ScheduleStore,
}

impl AppState {
    /// 创建新的AppState实例（库存台账写入 inventory_transaction，不发布事件）
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_collaborators(db_path, Arc::new(SqliteInventoryLedger), None)
    }

    /// 指定库存协作方与事件发布者
    pub fn with_collaborators(
        db_path: String,
        inventory: Arc<dyn InventoryGateway>,
        event_publisher: Option<Arc<dyn ProductionEventPublisher>>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接，自动建表）
        let store = ScheduleStore::open(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        let conn = store.connection();

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let schedule_repo = Arc::new(ScheduleRepository::new(conn.clone()));
        let item_repo = Arc::new(ProductionItemRepository::new(conn.clone()));
        let detail_repo = Arc::new(ProductionDetailRepository::new(conn.clone()));
        let allocation_repo = Arc::new(ProductionAllocationRepository::new(conn.clone()));
        let completion_repo = Arc::new(ProductionCompletionRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let reference_repo = Arc::new(ReferenceDataRepository::new(conn.clone()));

        // 配置管理器（与仓储共享连接）
        let config_manager = Arc::new(ConfigManager::from_connection(conn));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let events = OptionalEventPublisher::from_option(event_publisher);

        let schedule_aggregate = Arc::new(ScheduleAggregate::new(
            store.clone(),
            schedule_repo,
            config_manager.clone(),
            inventory.clone(),
            events.clone(),
        ));
        let item_lifecycle = Arc::new(ItemLifecycle::new(
            store.clone(),
            config_manager.clone(),
            inventory.clone(),
            events.clone(),
        ));
        let completion_recorder = Arc::new(CompletionRecorder::new(
            store.clone(),
            completion_repo,
            inventory,
            events.clone(),
        ));
        let allocation_ledger = Arc::new(AllocationLedger::new(
            store.clone(),
            allocation_repo,
            config_manager.clone(),
            events.clone(),
        ));
        let detail_explosion = Arc::new(DetailExplosion::new(store.clone(), detail_repo, events));

        // ==========================================
        // 创建API实例
        // ==========================================
        let production_api = Arc::new(ProductionApi::new(
            store.clone(),
            schedule_aggregate,
            item_lifecycle,
            completion_recorder,
            allocation_ledger,
            detail_explosion,
            item_repo,
            action_log_repo.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            production_api,
            config_manager,
            reference_repo,
            action_log_repo,
            store,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 PRODUCTION_SCHEDULING_DB > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./production_scheduling.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("production-scheduling");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("production_scheduling.db");
        }
    }

    path.to_string_lossy().to_string()
}
