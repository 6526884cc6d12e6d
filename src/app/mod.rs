// ==========================================
// 生产排程系统 - 应用层
// ==========================================
// 职责: 为宿主程序装配仓储、引擎与 API
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
