// ==========================================
// 生产排程系统 - 排程单领域模型
// ==========================================
// 排程单 = 表头，聚合若干生产项（每个成品一行）
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Schedule - 排程单表头
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: String,             // 排程单ID
    pub schedule_code: String,           // 排程单号 (唯一)
    pub schedule_date: NaiveDate,        // 排程日期
    pub source_doc_type: Option<String>, // 来源单据类型 (如 SALES_ORDER)
    pub source_doc_id: Option<String>,   // 来源单据ID
    pub customer_id: Option<String>,     // 客户
    pub remarks: Option<String>,         // 备注
    pub created_by: String,              // 创建人
    pub created_at: NaiveDateTime,       // 创建时间
    pub updated_at: NaiveDateTime,       // 更新时间
}

/// 创建排程单的输入
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSchedule {
    /// 为空时按 `{前缀}-{yyyymmdd}-{8位随机}` 生成
    pub schedule_code: Option<String>,
    pub schedule_date: Option<NaiveDate>,
    pub source_doc_type: Option<String>,
    pub source_doc_id: Option<String>,
    pub customer_id: Option<String>,
    pub remarks: Option<String>,
}

/// 排程进度汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleProgress {
    pub schedule_id: String,
    pub item_count: i64,
    pub pending_count: i64,
    pub in_progress_count: i64,
    pub completed_count: i64,
    pub total_scheduled: f64,
    pub total_completed: f64,
    pub total_allocated: f64,
}

impl ScheduleProgress {
    /// 完工率（0.0 ~ 1.0）
    pub fn completion_ratio(&self) -> f64 {
        if self.total_scheduled <= 0.0 {
            0.0
        } else {
            self.total_completed / self.total_scheduled
        }
    }
}
