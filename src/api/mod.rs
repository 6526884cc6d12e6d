// ==========================================
// 生产排程系统 - API 层
// ==========================================
// 职责: 对外服务接口，业务失败以带标签结果返回
// ==========================================

pub mod error;
pub mod production_api;

pub use error::{ApiError, ApiResult};
pub use production_api::{ProductionApi, ProductionItemGraph};
