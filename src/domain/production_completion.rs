// ==========================================
// 生产排程系统 - 完工记录
// ==========================================
// 红线: 只追加，不更新、不删除
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ProductionCompletion - 完工记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionCompletion {
    pub completion_id: String,            // 完工记录ID
    pub item_id: String,                  // 所属生产项
    pub seq_no: i32,                      // 同一生产项内的提交顺序
    pub quantity: f64,                    // 完工数量 (> 0)
    pub completed_at: NaiveDateTime,      // 完工时间
    pub warehouse_id: Option<String>,     // 入库仓库
    pub location: Option<String>,         // 入库库位
    pub batch_no: Option<String>,         // 批次号
    pub inventory_txn_id: Option<String>, // 对应库存事务
    pub created_by: String,
    pub created_at: NaiveDateTime,
}

/// 完工登记请求
///
/// 仓库/库位为空时取生产项自身的仓库/库位；完工时间为空时取当前时间。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub quantity: f64,
    pub warehouse_id: Option<String>,
    pub location: Option<String>,
    pub completed_at: Option<NaiveDateTime>,
    pub batch_no: Option<String>,
}

impl CompletionRequest {
    pub fn of_quantity(quantity: f64) -> Self {
        Self {
            quantity,
            ..Default::default()
        }
    }
}
