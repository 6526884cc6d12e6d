// ==========================================
// 生产排程系统 - 产出分配（需求核销）
// ==========================================
// 记录某生产项的计划/产出数量承诺给哪条需求行
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// ProductionAllocation - 分配记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionAllocation {
    pub allocation_id: String,     // 分配ID
    pub item_id: String,           // 所属生产项
    pub demand_line_id: String,    // 需求行（如销售订单行）
    pub allocated_quantity: f64,   // 分配数量 (> 0)
    pub created_at: NaiveDateTime, // 创建时间
}

/// 替换分配的输入行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProductionAllocation {
    pub demand_line_id: String,
    pub allocated_quantity: f64,
}

/// 需求行视角的供给（附带排程日期，便于按新近排序）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSupplyView {
    pub allocation: ProductionAllocation,
    pub schedule_id: String,
    pub schedule_code: String,
    pub schedule_date: NaiveDate,
    pub product_id: String,
}
