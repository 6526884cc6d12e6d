// ==========================================
// 生产排程系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、生产项状态机
// 红线: 不含数据访问逻辑
// ==========================================

pub mod action_log;
pub mod production_allocation;
pub mod production_completion;
pub mod production_detail;
pub mod production_item;
pub mod schedule;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use production_allocation::{DemandSupplyView, NewProductionAllocation, ProductionAllocation};
pub use production_completion::{CompletionRequest, ProductionCompletion};
pub use production_detail::{CompositionLine, NewProductionDetail, ProductionDetail};
pub use production_item::{ItemRuleViolation, NewProductionItem, ProductionItem, ProgressChange};
pub use schedule::{NewSchedule, Schedule, ScheduleProgress};
pub use types::{DeleteBlockReason, ProductionStatus, QTY_EPSILON};
