// ==========================================
// 生产排程系统 - 领域类型定义
// ==========================================
// 职责: 生产项状态、删除阻断原因、数量比较容差
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 数量比较容差（数量以 REAL 存储）
pub const QTY_EPSILON: f64 = 1e-9;

// ==========================================
// 生产项状态 (Production Status)
// ==========================================
// 单向推进: PENDING → IN_PROGRESS → COMPLETED
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionStatus {
    Pending,    // 待生产
    InProgress, // 生产中
    Completed,  // 已完工
}

impl fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ProductionStatus {
    /// 从数据库字符串解析状态（未知值返回 None）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(ProductionStatus::Pending),
            "IN_PROGRESS" => Some(ProductionStatus::InProgress),
            "COMPLETED" => Some(ProductionStatus::Completed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProductionStatus::Pending => "PENDING",
            ProductionStatus::InProgress => "IN_PROGRESS",
            ProductionStatus::Completed => "COMPLETED",
        }
    }
}

// ==========================================
// 删除阻断原因 (Delete Block Reason)
// ==========================================
// 用途: 向操作员解释“为什么不能删除”
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeleteBlockReason {
    /// 任一生产项存在完工记录
    HasCompletionRecords { item_id: String, count: i64 },
    /// 任一生产项存在需求分配记录
    HasAllocations { item_id: String, count: i64 },
    /// 任一生产项已完工数量大于 0
    HasCompletedQuantity { item_id: String, completed_quantity: f64 },
    /// 单项删除时生产项不处于待生产状态
    ItemNotPending { item_id: String, status: ProductionStatus },
}

impl DeleteBlockReason {
    /// 原因代码
    pub fn code(&self) -> &'static str {
        match self {
            DeleteBlockReason::HasCompletionRecords { .. } => "HAS_COMPLETION_RECORDS",
            DeleteBlockReason::HasAllocations { .. } => "HAS_ALLOCATIONS",
            DeleteBlockReason::HasCompletedQuantity { .. } => "HAS_COMPLETED_QUANTITY",
            DeleteBlockReason::ItemNotPending { .. } => "ITEM_NOT_PENDING",
        }
    }
}

impl fmt::Display for DeleteBlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteBlockReason::HasCompletionRecords { item_id, count } => write!(
                f,
                "生产项{}有{}条完工记录 (has completion records)",
                item_id, count
            ),
            DeleteBlockReason::HasAllocations { item_id, count } => write!(
                f,
                "生产项{}有{}条需求分配记录 (has allocation records)",
                item_id, count
            ),
            DeleteBlockReason::HasCompletedQuantity {
                item_id,
                completed_quantity,
            } => write!(
                f,
                "生产项{}已完工数量为{} (has completed quantity)",
                item_id, completed_quantity
            ),
            DeleteBlockReason::ItemNotPending { item_id, status } => write!(
                f,
                "生产项{}状态为{}，仅待生产项可删除 (item is not pending)",
                item_id, status
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_db_str() {
        for status in [
            ProductionStatus::Pending,
            ProductionStatus::InProgress,
            ProductionStatus::Completed,
        ] {
            assert_eq!(ProductionStatus::parse(status.to_db_str()), Some(status));
        }
        assert_eq!(ProductionStatus::parse("in_progress"), Some(ProductionStatus::InProgress));
        assert_eq!(ProductionStatus::parse("CANCELLED"), None);
    }

    #[test]
    fn test_delete_block_reason_message() {
        let reason = DeleteBlockReason::HasCompletionRecords {
            item_id: "I1".to_string(),
            count: 1,
        };
        assert_eq!(reason.code(), "HAS_COMPLETION_RECORDS");
        assert!(reason.to_string().contains("has completion records"));
    }
}
