// ==========================================
// 生产排程系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 组件: 生产项状态机 / 完工登记 / 需求分配 / 用料明细 / 排程单聚合
// 约定: 每个写操作在 ScheduleStore::write 的一个事务内完成读-校验-写，
//       审计日志与库存协作记录同事务提交；事件在提交后发布
// ==========================================

pub mod allocation_ledger;
pub mod completion_recorder;
pub mod detail_explosion;
pub mod error;
pub mod events;
pub mod inventory;
pub mod item_lifecycle;
pub mod schedule_aggregate;
pub mod validation;

use chrono::{Local, NaiveDateTime, Timelike};

// 重导出核心引擎
pub use allocation_ledger::AllocationLedger;
pub use completion_recorder::{CompletionOutcome, CompletionRecorder};
pub use detail_explosion::DetailExplosion;
pub use error::{EngineError, EngineResult};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, ProductionEvent, ProductionEventPublisher,
    ProductionEventType,
};
pub use inventory::{
    FinishedGoodsReceipt, InventoryGateway, NoOpInventoryGateway, SqliteInventoryLedger,
};
pub use item_lifecycle::{ItemLifecycle, StartOutcome};
pub use schedule_aggregate::{DeletionOutcome, ScheduleAggregate};
pub use validation::FieldValidator;

/// 当前本地时间（秒级，与存储精度一致）
pub(crate) fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// 去空白后为空的可选文本视为未提供
pub(crate) fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
