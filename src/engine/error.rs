// ==========================================
// 生产排程系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 业务规则失败以值返回；存储失败原样包裹，由 API 边界记录并转换
// ==========================================

use crate::domain::production_item::ItemRuleViolation;
use crate::domain::types::DeleteBlockReason;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("资源未找到: {entity}(id={id})")]
    NotFound { entity: String, id: String },

    #[error("字段校验失败: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

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

    #[error("删除被阻止: {0}")]
    DeleteBlocked(DeleteBlockReason),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::ValidationFailed(vec![message.into()])
    }

    /// 将生产项状态机规则违反映射为引擎错误
    pub fn from_rule(item_id: &str, violation: ItemRuleViolation) -> Self {
        match violation {
            ItemRuleViolation::IllegalTransition { from, to } => EngineError::IllegalStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            ItemRuleViolation::NonPositiveQuantity(q) => {
                EngineError::validation(format!("quantity: 数量必须大于0 (实际 {})", q))
            }
            ItemRuleViolation::NegativeQuantity(q) => {
                EngineError::validation(format!("quantity: 数量不能为负 (实际 {})", q))
            }
            ItemRuleViolation::ExceedsPlan {
                scheduled,
                completed,
                requested,
                overflow,
            } => EngineError::QuantityExceedsPlan {
                item_id: item_id.to_string(),
                scheduled,
                completed,
                requested,
                overflow,
            },
        }
    }

    /// 是否为存储/基础设施失败
    pub fn is_store_failure(&self) -> bool {
        matches!(self, EngineError::Repository(_))
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Repository(other),
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ProductionStatus;

    #[test]
    fn test_rule_violation_mapping() {
        let err = EngineError::from_rule(
            "I1",
            ItemRuleViolation::ExceedsPlan {
                scheduled: 100.0,
                completed: 90.0,
                requested: 20.0,
                overflow: 10.0,
            },
        );
        match err {
            EngineError::QuantityExceedsPlan { item_id, overflow, .. } => {
                assert_eq!(item_id, "I1");
                assert_eq!(overflow, 10.0);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let err = EngineError::from_rule(
            "I1",
            ItemRuleViolation::IllegalTransition {
                from: ProductionStatus::Completed,
                to: ProductionStatus::Completed,
            },
        );
        assert!(matches!(err, EngineError::IllegalStateTransition { ref from, .. } if from == "COMPLETED"));

        let err = EngineError::from_rule("I1", ItemRuleViolation::NonPositiveQuantity(0.0));
        assert!(matches!(err, EngineError::ValidationFailed(ref m) if m.len() == 1));
    }

    #[test]
    fn test_repository_not_found_is_business_error() {
        let err: EngineError = RepositoryError::not_found("ProductionItem", "X").into();
        assert!(matches!(err, EngineError::NotFound { .. }));
        assert!(!err.is_store_failure());

        let err: EngineError = RepositoryError::DatabaseQueryError("disk I/O".into()).into();
        assert!(err.is_store_failure());
    }
}
