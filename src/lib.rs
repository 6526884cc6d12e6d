// ==========================================
// 生产排程与完工履约核销 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 排程单/生产项记录系统（完工登记、需求分配、用料明细）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体、类型与生产项状态机
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{DeleteBlockReason, ProductionStatus, QTY_EPSILON};

// 领域实体
pub use domain::{
    ActionLog, ActionType, CompletionRequest, NewProductionAllocation, NewProductionDetail,
    NewProductionItem, NewSchedule, ProductionAllocation, ProductionCompletion, ProductionDetail,
    ProductionItem, Schedule, ScheduleProgress,
};

// 引擎
pub use engine::{
    AllocationLedger, CompletionRecorder, DetailExplosion, EngineError, ItemLifecycle,
    ScheduleAggregate,
};

// API
pub use api::{ApiError, ApiResult, ProductionApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "生产排程与完工履约核销";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
