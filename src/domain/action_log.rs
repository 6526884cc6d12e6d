// ==========================================
// 生产排程系统 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录
// 用途: 审计追踪；人工改写已完工数量的纠偏记录
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,           // 日志ID
    pub schedule_id: Option<String>, // 关联排程单
    pub item_id: Option<String>,     // 关联生产项
    pub action_type: String,         // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,    // 操作时间戳
    pub actor: String,               // 操作人
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,      // 详细描述
}

impl ActionLog {
    /// 以当前时间构造一条日志
    pub fn new(action_type: ActionType, actor: &str, now: NaiveDateTime) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            schedule_id: None,
            item_id: None,
            action_type: action_type.as_str().to_string(),
            action_ts: now,
            actor: actor.to_string(),
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_schedule(mut self, schedule_id: &str) -> Self {
        self.schedule_id = Some(schedule_id.to_string());
        self
    }

    pub fn with_item(mut self, item_id: &str) -> Self {
        self.item_id = Some(item_id.to_string());
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateSchedule,            // 创建排程单
    UpdateSchedule,            // 修改排程单表头
    DeleteSchedule,            // 删除排程单
    CreateItems,               // 批量创建生产项
    DeleteItem,                // 删除生产项
    StartItem,                 // 开工
    RecordCompletion,          // 完工登记
    CompletedQuantityOverride, // 人工改写已完工数量
    ReplaceDetails,            // 替换用料明细
    DeleteDetails,             // 清空用料明细
    ReplaceAllocations,        // 替换需求分配
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateSchedule => "CreateSchedule",
            ActionType::UpdateSchedule => "UpdateSchedule",
            ActionType::DeleteSchedule => "DeleteSchedule",
            ActionType::CreateItems => "CreateItems",
            ActionType::DeleteItem => "DeleteItem",
            ActionType::StartItem => "StartItem",
            ActionType::RecordCompletion => "RecordCompletion",
            ActionType::CompletedQuantityOverride => "CompletedQuantityOverride",
            ActionType::ReplaceDetails => "ReplaceDetails",
            ActionType::DeleteDetails => "DeleteDetails",
            ActionType::ReplaceAllocations => "ReplaceAllocations",
        }
    }
}
