// ==========================================
// 生产排程系统 - API层错误类型
// ==========================================
// 职责: 对外的带标签结果；业务失败以值返回，基础设施失败统一为 StoreFailure
// ==========================================

use crate::domain::types::DeleteBlockReason;
use crate::engine::error::EngineError;
use crate::importer::error::ImportError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("字段校验失败: {}", .messages.join("; "))]
    ValidationFailed { messages: Vec<String> },

    #[error("超出计划数量: item_id={item_id}, 计划={scheduled}, 已完工={completed}, 本次={requested}, 超出={overflow}")]
    QuantityExceedsPlan {
        item_id: String,
        scheduled: f64,
        completed: f64,
        requested: f64,
        overflow: f64,
    },

    #[error("无效的状态转换: from={from} to={to}")]
    IllegalStateTransition { from: String, to: String },

    #[error("删除被阻止: {reason}")]
    DeleteBlocked { reason: DeleteBlockReason },

    /// 存储层失败（细节只记录在日志中）
    #[error("存储失败: {0}")]
    StoreFailure(String),
}

impl ApiError {
    /// 错误种类标识
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::ValidationFailed { .. } => "ValidationFailed",
            ApiError::QuantityExceedsPlan { .. } => "QuantityExceedsPlan",
            ApiError::IllegalStateTransition { .. } => "IllegalStateTransition",
            ApiError::DeleteBlocked { .. } => "DeleteBlocked",
            ApiError::StoreFailure(_) => "StoreFailure",
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            EngineError::ValidationFailed(messages) => ApiError::ValidationFailed { messages },
            EngineError::QuantityExceedsPlan {
                item_id,
                scheduled,
                completed,
                requested,
                overflow,
            } => ApiError::QuantityExceedsPlan {
                item_id,
                scheduled,
                completed,
                requested,
                overflow,
            },
            EngineError::IllegalStateTransition { from, to } => {
                ApiError::IllegalStateTransition { from, to }
            }
            EngineError::DeleteBlocked(reason) => ApiError::DeleteBlocked { reason },
            EngineError::Repository(_) => ApiError::StoreFailure("记录存储操作失败".to_string()),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(path) => ApiError::NotFound(format!("文件{}不存在", path)),
            other => ApiError::ValidationFailed {
                messages: other.messages(),
            },
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::error::RepositoryError;

    #[test]
    fn test_store_failure_is_opaque() {
        let err: ApiError =
            EngineError::from(RepositoryError::DatabaseQueryError("disk I/O error at page 7".into())).into();
        assert_eq!(err.kind(), "StoreFailure");
        assert!(!err.to_string().contains("page 7"));
    }

    #[test]
    fn test_delete_blocked_message_names_condition() {
        let err: ApiError = EngineError::DeleteBlocked(DeleteBlockReason::HasCompletionRecords {
            item_id: "I1".to_string(),
            count: 1,
        })
        .into();
        assert_eq!(err.kind(), "DeleteBlocked");
        assert!(err.to_string().contains("has completion records"));
    }

    #[test]
    fn test_import_row_errors_become_validation_messages() {
        let err: ApiError = ImportError::RowErrors(vec![crate::importer::error::RowError {
            row: 3,
            field: "scheduled_quantity".to_string(),
            message: "必须大于0".to_string(),
        }])
        .into();
        match err {
            ApiError::ValidationFailed { messages } => {
                assert_eq!(messages.len(), 1);
                assert!(messages[0].contains("行 3"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
