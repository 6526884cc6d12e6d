// ==========================================
// 生产排程系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: 仓储结构体用于只读查询；模块级自由函数接收 `&Connection`，
//       由 engine 在 ScheduleStore::write 的事务内组合调用
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod inventory_txn_repo;
pub mod production_allocation_repo;
pub mod production_completion_repo;
pub mod production_detail_repo;
pub mod production_item_repo;
pub mod reference_repo;
pub mod schedule_repo;
pub mod sql_codec;
pub mod store;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use production_allocation_repo::ProductionAllocationRepository;
pub use production_completion_repo::ProductionCompletionRepository;
pub use production_detail_repo::ProductionDetailRepository;
pub use production_item_repo::ProductionItemRepository;
pub use reference_repo::ReferenceDataRepository;
pub use schedule_repo::ScheduleRepository;
pub use store::ScheduleStore;
