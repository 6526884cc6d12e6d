// ==========================================
// 生产排程系统 - 导入层
// ==========================================
// 职责: 将外部排程行文件解析为生产项创建输入
// ==========================================

pub mod error;
pub mod schedule_csv;

pub use error::{ImportError, ImportResult, RowError};
pub use schedule_csv::ScheduleLineCsvParser;
